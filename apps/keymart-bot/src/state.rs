use keymart_db::repositories::{
    DialogRepository, LanguageRepository, PendingRepository, ProductRepository, ProofRepository,
};
use keymart_db::sync::SyncService;

#[derive(Clone)]
pub struct AppState {
    pub products: ProductRepository,
    pub pending: PendingRepository,
    pub dialogs: DialogRepository,
    pub languages: LanguageRepository,
    pub proofs: ProofRepository,
    pub sync: SyncService,
    pub admin_id: i64,
    pub admin_phone: String,
    pub totp_api_key: Option<String>,
}

impl AppState {
    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }
}
