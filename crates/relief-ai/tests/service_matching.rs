use relief_ai::workflows::encoding::{BeneficiaryProfile, FeatureEncoder, RecordOrigin};
use relief_ai::workflows::feedback::NgoCatalog;
use relief_ai::workflows::hazards::AlertLevel;
use relief_ai::workflows::matching::{
    builtin_reference_population, rank_services, weighted_score, ActiveHazard, EncodedCatalog,
    MatchError, MatchOptions, ServiceCatalog,
};
use relief_ai::{AppError, PipelineContext};

fn context() -> PipelineContext {
    PipelineContext::build(
        &builtin_reference_population(),
        ServiceCatalog::builtin(),
        NgoCatalog::builtin(),
        MatchOptions::default(),
    )
    .expect("context builds from built-in tables")
}

fn profile() -> BeneficiaryProfile {
    BeneficiaryProfile {
        age: Some(34.0),
        income: Some(120.0),
        location: Some("Nairobi".to_string()),
        gender: Some("Female".to_string()),
        employment: Some("Unemployed".to_string()),
        ..BeneficiaryProfile::default()
    }
}

#[test]
fn rankings_are_sorted_and_bounded_by_top_n() {
    let recommendation = context().recommend(&profile(), None).expect("recommend");

    assert_eq!(recommendation.services.len(), 3);
    assert!(recommendation
        .services
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
    for service in &recommendation.services {
        assert!(service.similarity.abs() <= 1.0 + 1e-9);
        assert_eq!(service.score, weighted_score(service.similarity, service.weight));
    }
}

#[test]
fn severe_active_hazard_triples_applicable_services() {
    let context = context();
    let active = vec![ActiveHazard {
        event_type: "FL".to_string(),
        alert_level: AlertLevel::Red,
    }];
    let recommendation = context
        .recommend(&profile(), Some(&active))
        .expect("recommend");

    assert!(recommendation
        .services
        .iter()
        .all(|service| [1.0, 3.0].contains(&service.weight)));
    assert!(recommendation
        .services
        .iter()
        .any(|service| service.weight == 3.0));
}

#[test]
fn vectors_from_another_encoder_are_rejected() {
    let context = context();
    let mut other_reference = builtin_reference_population();
    other_reference.truncate(4);
    let other = FeatureEncoder::fit(BeneficiaryProfile::schema(), &other_reference)
        .expect("second encoder");

    let foreign = other
        .encode(&profile().to_record(), RecordOrigin::Request)
        .expect("encode");
    let catalog = EncodedCatalog::encode(context.encoder(), context.catalog()).expect("catalog");
    let error = rank_services(&foreign, &catalog, None, context.match_options())
        .expect_err("mismatched encoders");
    assert!(matches!(error, MatchError::EncoderMismatch(_)));
}

#[test]
fn empty_reference_population_cannot_build_a_context() {
    let error = PipelineContext::build(
        &[],
        ServiceCatalog::builtin(),
        NgoCatalog::builtin(),
        MatchOptions::default(),
    )
    .expect_err("empty reference population");
    let error = AppError::from(error);
    assert!(error.to_string().contains("empty reference"));
}
