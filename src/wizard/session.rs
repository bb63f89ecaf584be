use zeroize::Zeroizing;

/// Transient answers collected across wizard steps, committed in one go
/// by the terminal step. Lives for the app process; the restart after a
/// completed setup clears it implicitly.
///
/// Only the active step (or the host UI acting on its behalf) writes
/// here; nothing reads it before the final commit.
#[derive(Debug)]
pub struct SetupSession {
    pub suggestions_enabled: bool,
    pub admin_password: Zeroizing<String>,
    pub org_name: String,
}

impl SetupSession {
    pub fn new(suggestions_default: bool) -> Self {
        Self {
            suggestions_enabled: suggestions_default,
            admin_password: Zeroizing::new(String::new()),
            org_name: String::new(),
        }
    }
}
