//! Mixed numeric/categorical records to fixed-width vectors.
//!
//! An encoder is fitted once on a reference population and then applied unchanged to the
//! service catalog and to every incoming profile, so all vectors share one column layout.

mod encoder;
pub mod profile;
mod schema;

pub use encoder::{EncodedVector, EncoderId, EncodingError, FeatureEncoder, FittedEncoder};
pub use profile::BeneficiaryProfile;
pub use schema::{AttributeRecord, FeatureSchema, RecordOrigin, SchemaError};
