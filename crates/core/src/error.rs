#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
