use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{timestamp_from_sql, timestamp_to_sql, uuid_from_sql, DatabaseError};
use crate::models::enums::DocumentType;
use crate::models::*;

pub fn insert_document(conn: &Connection, doc: &EnquiryDocument) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO enquiry_documents (id, enquiry_id, doc_type, original_name, stored_path,
         content_type, size_bytes, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            doc.id.to_string(),
            doc.enquiry_id.to_string(),
            doc.doc_type.as_str(),
            doc.original_name,
            doc.stored_path,
            doc.content_type,
            doc.size_bytes,
            timestamp_to_sql(&doc.uploaded_at),
        ],
    )?;
    Ok(())
}

pub fn list_documents(
    conn: &Connection,
    enquiry_id: &Uuid,
) -> Result<Vec<EnquiryDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, enquiry_id, doc_type, original_name, stored_path, content_type,
         size_bytes, uploaded_at
         FROM enquiry_documents WHERE enquiry_id = ?1 ORDER BY uploaded_at, original_name",
    )?;

    let rows = stmt
        .query_map(params![enquiry_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(id, enquiry_id, doc_type, original_name, stored_path, content_type, size_bytes, uploaded_at)| {
                Ok(EnquiryDocument {
                    id: uuid_from_sql("enquiry_documents.id", &id)?,
                    enquiry_id: uuid_from_sql("enquiry_documents.enquiry_id", &enquiry_id)?,
                    doc_type: DocumentType::from_str(&doc_type)?,
                    original_name,
                    stored_path,
                    content_type,
                    size_bytes,
                    uploaded_at: timestamp_from_sql("uploaded_at", &uploaded_at)?,
                })
            },
        )
        .collect()
}
