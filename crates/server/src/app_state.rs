use server_api::ApiContext;
use shared::messages::{Locale, MessageCatalog};

use crate::session::SessionKey;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) catalog: MessageCatalog,
    pub(crate) default_locale: Locale,
    pub(crate) session_key: SessionKey,
}
