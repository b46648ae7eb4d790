mod error;
mod custodian;
mod local;
mod remote;
mod relay;
mod mock;

pub use error::{CustodyError, Result};
pub use custodian::{
    signing_message, KeyCustodian, SignatureRef, SigningDomain, TransactionRef, MESSAGE_TAG,
};
pub use local::LocalKeyCustodian;
pub use remote::RemoteSignerCustodian;
pub use relay::{http_rpc_client, AlloyRelay, TransactionRelay};
pub use mock::{MockCustodian, MockRelay};
