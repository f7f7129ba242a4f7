use serde::{Deserialize, Serialize};

/// Identity of the signed-in user, passed explicitly to every component that
/// needs it. One context lives exactly as long as one authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name used to greet the user: display name, else the e-mail local part,
    /// else "there".
    pub fn greeting_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        if let Some(email) = self.email.as_deref() {
            if let Some((local, _)) = email.split_once('@') {
                return local.to_string();
            }
        }
        "there".to_string()
    }
}
