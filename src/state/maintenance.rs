//! Maintenance mode gate

use tracing::{info, warn};

use crate::error::ControllerError;

/// Capability handed out by [`MaintenanceGate::enter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceToken(String);

impl MaintenanceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Password-protected switch that unlocks preset and title editing
///
/// One session at a time: entering again replaces the previous token.
#[derive(Debug)]
pub struct MaintenanceGate {
    secret: String,
    session: Option<MaintenanceToken>,
    sessions_issued: u64,
}

impl MaintenanceGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            session: None,
            sessions_issued: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn enter(&mut self, password: &str) -> Result<MaintenanceToken, ControllerError> {
        if !constant_time_eq(password.as_bytes(), self.secret.as_bytes()) {
            warn!("Maintenance login rejected");
            return Err(ControllerError::AuthenticationFailed);
        }
        self.sessions_issued += 1;
        let token = MaintenanceToken(format!("{:032x}", rand::random::<u128>()));
        self.session = Some(token.clone());
        info!("Maintenance mode enabled (session {})", self.sessions_issued);
        Ok(token)
    }

    pub fn exit(&mut self) {
        if self.session.take().is_some() {
            info!("Returned to operation mode");
        }
    }

    /// True while maintenance is active and `token` is the current session
    pub fn authorizes(&self, token: Option<&MaintenanceToken>) -> bool {
        match (&self.session, token) {
            (Some(session), Some(token)) => {
                constant_time_eq(session.as_str().as_bytes(), token.as_str().as_bytes())
            }
            _ => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_is_rejected_and_retry_allowed() {
        let mut gate = MaintenanceGate::new("tdk123");
        assert_eq!(gate.enter("tdk12"), Err(ControllerError::AuthenticationFailed));
        assert_eq!(gate.enter("TDK123"), Err(ControllerError::AuthenticationFailed));
        assert!(!gate.is_active());

        let token = gate.enter("tdk123").unwrap();
        assert!(gate.is_active());
        assert!(gate.authorizes(Some(&token)));
    }

    #[test]
    fn exit_revokes_token() {
        let mut gate = MaintenanceGate::new("secret");
        let token = gate.enter("secret").unwrap();
        gate.exit();
        assert!(!gate.is_active());
        assert!(!gate.authorizes(Some(&token)));
    }

    #[test]
    fn stale_or_missing_token_is_not_authorized() {
        let mut gate = MaintenanceGate::new("secret");
        let first = gate.enter("secret").unwrap();
        let second = gate.enter("secret").unwrap();
        assert_ne!(first, second);
        assert!(!gate.authorizes(Some(&first)));
        assert!(gate.authorizes(Some(&second)));
        assert!(!gate.authorizes(None));
    }

    #[test]
    fn tokens_are_random_not_sequential() {
        let mut gate = MaintenanceGate::new("secret");
        let tokens: Vec<MaintenanceToken> =
            (0..64).map(|_| gate.enter("secret").unwrap()).collect();

        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(token.as_str().len(), 32);
            assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
            assert!(!token.as_str().contains('-'));
            for other in &tokens[i + 1..] {
                assert_ne!(token, other);
            }
        }
        assert!(!tokens[0].as_str().starts_with("1-"));
        assert!(gate.authorizes(tokens.last()));
    }
}
