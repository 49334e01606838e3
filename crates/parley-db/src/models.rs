/// Database row types — these map directly to SQLite rows.
/// Distinct from the parley-types wire models to keep the DB layer
/// independent; the gateway does the conversion.

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub text: String,
    pub sender: String,
    pub timestamp: String,
    pub status: String,
}
