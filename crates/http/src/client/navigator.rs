//! Navigation side effects requested by the client

/// Receives the redirect-to-login request raised when a session is lost
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

/// Ignores redirects
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self) {}
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self();
    }
}
