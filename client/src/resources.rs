//! Resources the workforce app writes while offline.

use crewsync_engine::{FieldDef, FieldType, ResourceSchema, Schema};

/// Schema covering every table the field app mutates.
pub fn default_schema() -> Schema {
    Schema::new()
        .with_resource(ResourceSchema::new(
            "workers",
            vec![
                FieldDef::required("full_name", FieldType::String),
                FieldDef::optional("trade", FieldType::String),
                FieldDef::optional("phone", FieldType::String),
                FieldDef::optional("active", FieldType::Bool),
            ],
        ))
        .with_resource(ResourceSchema::new(
            "time_entries",
            vec![
                FieldDef::required("worker_id", FieldType::String),
                FieldDef::required("hours", FieldType::Float),
                FieldDef::optional("site_id", FieldType::String),
                FieldDef::optional("clock_in", FieldType::Timestamp),
                FieldDef::optional("clock_out", FieldType::Timestamp),
                FieldDef::optional("notes", FieldType::String),
            ],
        ))
        .with_resource(ResourceSchema::new(
            "work_assignments",
            vec![
                FieldDef::required("worker_id", FieldType::String),
                FieldDef::required("site_id", FieldType::String),
                FieldDef::optional("task", FieldType::String),
                FieldDef::optional("status", FieldType::String),
                FieldDef::optional("due_at", FieldType::Timestamp),
            ],
        ))
        .with_resource(ResourceSchema::new(
            "site_documents",
            vec![
                FieldDef::required("site_id", FieldType::String),
                FieldDef::required("title", FieldType::String),
                FieldDef::optional("url", FieldType::String),
                FieldDef::optional("metadata", FieldType::Json),
            ],
        ))
        .with_resource(ResourceSchema::new(
            "daily_reports",
            vec![
                FieldDef::required("site_id", FieldType::String),
                FieldDef::required("report_date", FieldType::Timestamp),
                FieldDef::optional("weather", FieldType::String),
                FieldDef::optional("crew_count", FieldType::Int),
                FieldDef::optional("summary", FieldType::String),
            ],
        ))
        .with_resource(ResourceSchema::new(
            "safety_incidents",
            vec![
                FieldDef::required("site_id", FieldType::String),
                FieldDef::required("severity", FieldType::String),
                FieldDef::required("description", FieldType::String),
                FieldDef::optional("reported_by", FieldType::String),
                FieldDef::optional("occurred_at", FieldType::Timestamp),
                FieldDef::optional("injury", FieldType::Bool),
            ],
        ))
}
