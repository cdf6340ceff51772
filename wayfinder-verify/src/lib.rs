pub mod ans104;
pub mod deep_hash;
pub mod hash;
pub mod merkle;
pub mod pss;
pub mod root_source;
pub mod strategy;
pub mod tap;
pub mod transaction;

pub use ans104::Ans104SignatureVerification;
pub use deep_hash::{deep_hash, DeepHashItem};
pub use hash::HashVerification;
pub use merkle::compute_data_root;
pub use root_source::{
    GqlRootSource, RootTransactionInfo, RootTransactionSource, TransactionMetadata,
    TrustedGatewayRootSource,
};
pub use strategy::{effective_verification_id, CompositeVerificationStrategy, VerificationStrategy};
pub use tap::StreamTapper;
pub use transaction::TransactionSignatureVerification;
