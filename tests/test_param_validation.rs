use crfseg::train::{LbfgsParams, Trainer};
use crfseg::Error;

#[test]
fn test_theta_validation() {
    let mut trainer = Trainer::new();

    // theta must be non-negative
    let result = trainer.set_theta(-1.0);
    assert!(matches!(result, Err(Error::InvalidParameter(_))));
    assert_eq!(
        result.unwrap_err().to_string(),
        "theta must be non-negative"
    );

    // theta = 0.0 disables regularization
    assert!(trainer.set_theta(0.0).is_ok());
    assert!(trainer.set_theta(1.0).is_ok());
    assert_eq!(trainer.theta(), 1.0);

    assert!(trainer.set_theta(f64::INFINITY).is_err());
    assert_eq!(trainer.theta(), 1.0);
}

#[test]
fn test_max_iterations_validation() {
    let mut trainer = Trainer::new();

    let result = trainer.set_max_iterations(0);
    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().to_string(),
        "max_iterations must be at least 1"
    );

    assert!(trainer.set_max_iterations(1).is_ok());
    assert_eq!(trainer.max_iterations(), 1);
}

#[test]
fn test_builder_validation() {
    assert!(Trainer::new().with_theta(-0.5).is_err());
    assert!(Trainer::new().with_max_iterations(0).is_err());

    let trainer = Trainer::new()
        .with_theta(0.01)
        .and_then(|t| t.with_max_iterations(10))
        .unwrap();
    assert_eq!(trainer.theta(), 0.01);
    assert_eq!(trainer.max_iterations(), 10);
}

#[test]
fn test_parameter_errors_exit_code() {
    let err = Trainer::new().with_theta(-1.0).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_lbfgs_params_validation() {
    let mut params = LbfgsParams::default();
    assert_eq!(params.epsilon(), 1e-5);
    assert_eq!(params.period(), 10);
    assert_eq!(params.delta(), 1e-5);
    assert_eq!(params.max_linesearch(), 20);

    assert_eq!(
        params.set_epsilon(-0.001).unwrap_err().to_string(),
        "epsilon must be non-negative"
    );
    assert_eq!(
        params.set_delta(-0.001).unwrap_err().to_string(),
        "delta must be non-negative"
    );
    assert_eq!(
        params.set_max_linesearch(0).unwrap_err().to_string(),
        "max_linesearch must be positive"
    );
    assert!(params.set_epsilon(0.0).is_ok());
    assert!(params.set_max_linesearch(40).is_ok());
}
