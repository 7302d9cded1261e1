use crate::session::PawMapSession;

pub struct AppState {
    pub session: PawMapSession,
}
