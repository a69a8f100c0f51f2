//! Profile-to-service ranking by cosine similarity, reweighted by active hazards.

mod catalog;
mod matcher;

pub use catalog::{
    builtin_reference_population, HazardApplicability, ServiceCatalog, ServiceOffering,
    ALWAYS_APPLICABLE,
};
pub use matcher::{
    cosine_similarity, hazard_weight, rank_services, weighted_score, ActiveHazard, EncodedCatalog,
    EncodedService, EncoderMismatchError, MatchError, MatchOptions, RankedService,
};
