use serde::{Deserialize, Serialize};

/// A call-center staff member, keyed by extension number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub department_id: Option<String>,
    pub email: Option<String>,
    /// Whether this operator receives admin report emails.
    pub is_admin: bool,
}

/// An organizational department operators belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
}
