pub mod dialog_repo;
pub mod lang_repo;
pub mod pending_repo;
pub mod product_repo;
pub mod proof_repo;

pub use dialog_repo::DialogRepository;
pub use lang_repo::LanguageRepository;
pub use pending_repo::PendingRepository;
pub use product_repo::ProductRepository;
pub use proof_repo::ProofRepository;
