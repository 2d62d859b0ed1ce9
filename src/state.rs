use crate::adapters::TokioTimeProvider;
use crate::config::AppConfig;
use crate::push::NotificationService;

#[derive(Clone)]
pub struct AppState<St, C, Tr> {
    pub config: AppConfig,
    pub store: St,
    pub notifier: NotificationService<St, C, Tr, TokioTimeProvider>,
}
