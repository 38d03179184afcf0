use cimatrix::core::config::{MatrixConfig, OperatorProfile, VersionEncoding};
use cimatrix::core::dataset::Family;
use cimatrix::core::error::MatrixError;
use cimatrix::engine::classifier::{Classifier, VersionTokenDecoder};

const NNO_MASTER: &str =
    "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e-master";
const NNO_RELEASE: &str =
    "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.14-stable-nvidia-network-operator-e2e-24-10-x";

fn nno() -> Classifier {
    Classifier::new(&MatrixConfig::default()).expect("default classifier")
}

#[test]
fn master_job_is_a_bundle_test() {
    let class = nno().classify(NNO_MASTER).unwrap();
    assert_eq!(class.platform_version, "4.17");
    assert_eq!(class.family, Family::Bundle);
    assert_eq!(class.version_tag, "master");
    assert_eq!(class.component_version, "");
}

#[test]
fn versioned_job_is_a_release_test() {
    let class = nno().classify(NNO_RELEASE).unwrap();
    assert_eq!(class.platform_version, "4.14");
    assert_eq!(class.family, Family::Release);
    assert_eq!(class.version_tag, "24-10-x");
    assert_eq!(class.component_version, "24.10.x");
}

#[test]
fn rehearsal_jobs_are_recognized() {
    let name = format!("rehearse-61234-{}", NNO_MASTER);
    let class = nno().classify(&name).unwrap();
    assert_eq!(class.platform_version, "4.17");
    assert_eq!(class.family, Family::Bundle);
}

#[test]
fn malformed_names_fail_closed() {
    let classifier = nno();
    let bad = [
        "",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e-main",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e-24",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-417-stable-nvidia-network-operator-e2e-master",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17.1-stable-nvidia-network-operator-e2e-master",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4-stable-nvidia-network-operator-e2e-master",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-nightly-nvidia-network-operator-e2e-master",
        "periodic-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e-master",
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e-master-extra",
    ];
    for name in bad {
        let err = classifier.classify(name).unwrap_err();
        assert!(
            matches!(err, MatrixError::UnrecognizedJobName(ref n) if n == name),
            "expected rejection for {:?}",
            name
        );
    }
}

#[test]
fn other_operator_jobs_are_rejected_by_profile() {
    let gpu_job =
        "pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-gpu-operator-e2e-master";
    assert!(nno().classify(gpu_job).is_err());

    let config = MatrixConfig {
        operator: OperatorProfile::gpu(),
        ..MatrixConfig::default()
    };
    let gpu = Classifier::new(&config).unwrap();
    assert_eq!(gpu.classify(gpu_job).unwrap().family, Family::Bundle);
    assert!(gpu.classify(NNO_MASTER).is_err());
}

#[test]
fn version_encoding_is_configurable() {
    let config = MatrixConfig {
        version_encoding: VersionEncoding::TrimWildcard,
        ..MatrixConfig::default()
    };
    let class = Classifier::new(&config).unwrap().classify(NNO_RELEASE).unwrap();
    assert_eq!(class.component_version, "24.10");
}

struct MajorOnly;

impl VersionTokenDecoder for MajorOnly {
    fn decode(&self, token: &str) -> Option<String> {
        token.split('-').next().map(|major| format!("{}.x", major))
    }
}

struct RejectAll;

impl VersionTokenDecoder for RejectAll {
    fn decode(&self, _token: &str) -> Option<String> {
        None
    }
}

#[test]
fn custom_decoder_can_be_plugged_in() {
    let classifier = nno().with_decoder(Box::new(MajorOnly));
    assert_eq!(classifier.classify(NNO_RELEASE).unwrap().component_version, "24.x");
}

#[test]
fn decoder_rejection_rejects_the_job() {
    let classifier = nno().with_decoder(Box::new(RejectAll));
    assert!(matches!(
        classifier.classify(NNO_RELEASE),
        Err(MatrixError::UnrecognizedJobName(_))
    ));
    assert_eq!(classifier.classify(NNO_MASTER).unwrap().family, Family::Bundle);
}

#[test]
fn custom_prefix_and_bundle_tag() {
    let config = MatrixConfig {
        job_prefix: "periodic-ci-acme-".to_string(),
        bundle_tag: "main".to_string(),
        ..MatrixConfig::default()
    };
    let classifier = Classifier::new(&config).unwrap();
    let class = classifier
        .classify("periodic-ci-acme-4.18-stable-nvidia-network-operator-e2e-main")
        .unwrap();
    assert_eq!(class.platform_version, "4.18");
    assert_eq!(class.family, Family::Bundle);
}

#[test]
fn empty_job_pattern_is_a_config_error() {
    let config = MatrixConfig {
        operator: OperatorProfile {
            name: "x".into(),
            display_name: "X".into(),
            job_pattern: " ".into(),
        },
        ..MatrixConfig::default()
    };
    assert!(matches!(
        Classifier::new(&config),
        Err(MatrixError::ConfigError(_))
    ));
}
