// tests/volume_planning.rs
use pipette_transfer::{
    GradientFunction, ValidationError, VolumeSpec, expand_for_volume_constraints,
    extend_source_target_lists, split_volume, volume_gradient,
};
use proptest::prelude::*;

#[test]
fn test_linear_gradient_hits_both_endpoints() {
    let volumes = volume_gradient(20.0, 100.0, 5, &GradientFunction::linear());
    assert_eq!(volumes, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
}

#[test]
fn test_single_transfer_gradient_uses_min() {
    let volumes = volume_gradient(20.0, 100.0, 1, &GradientFunction::linear());
    assert_eq!(volumes, vec![20.0]);
}

#[test]
fn test_descending_gradient() {
    let volumes = volume_gradient(100.0, 20.0, 3, &GradientFunction::linear());
    assert_eq!(volumes, vec![100.0, 60.0, 20.0]);
}

#[test]
fn test_custom_gradient_curve() {
    let quadratic = GradientFunction::new(|x| x * x);
    let volumes = volume_gradient(0.0, 100.0, 3, &quadratic);
    assert_eq!(volumes, vec![0.0, 25.0, 100.0]);
}

#[test]
fn test_split_volume() {
    assert_eq!(split_volume(700.0, 300.0), vec![300.0, 200.0, 200.0]);
    assert_eq!(split_volume(900.0, 300.0), vec![300.0, 300.0, 300.0]);
    assert_eq!(split_volume(500.0, 300.0), vec![250.0, 250.0]);
    assert_eq!(split_volume(300.0, 300.0), vec![300.0]);
    assert_eq!(split_volume(0.0, 300.0), vec![0.0]);
}

#[test]
fn test_expand_for_volume_constraints_keeps_targets() {
    let expanded = expand_for_volume_constraints([700.0, 50.0], ["a", "b"], 300.0);
    assert_eq!(
        expanded,
        vec![(300.0, "a"), (200.0, "a"), (200.0, "a"), (50.0, "b")]
    );
}

#[test]
fn test_extend_source_target_lists() {
    let (sources, targets) = extend_source_target_lists(&[1, 2], &[10, 20, 30, 40]).unwrap();
    assert_eq!(sources, vec![1, 1, 2, 2]);
    assert_eq!(targets, vec![10, 20, 30, 40]);

    let (sources, targets) = extend_source_target_lists(&[1, 2, 3, 4, 5, 6], &[10, 20]).unwrap();
    assert_eq!(sources, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(targets, vec![10, 10, 10, 20, 20, 20]);

    let (sources, targets) = extend_source_target_lists(&[1, 2], &[10, 20]).unwrap();
    assert_eq!((sources, targets), (vec![1, 2], vec![10, 20]));
}

#[test]
fn test_extend_source_target_lists_rejects_uneven_lists() {
    assert_eq!(
        extend_source_target_lists(&[1, 2], &[10, 20, 30]),
        Err(ValidationError::IndivisibleLists {
            sources: 2,
            destinations: 3,
        })
    );
    assert!(extend_source_target_lists::<u8>(&[], &[1]).is_err());
}

#[test]
fn test_volume_spec_validation() {
    let linear = GradientFunction::linear();

    assert_eq!(
        VolumeSpec::from(vec![1.0, 2.0]).to_volume_list(3, &linear),
        Err(ValidationError::VolumeListLength {
            expected: 3,
            actual: 2,
        })
    );
    assert!(matches!(
        VolumeSpec::Uniform(-5.0).to_volume_list(2, &linear),
        Err(ValidationError::NegativeValue { field: "volume", .. })
    ));
    assert!(matches!(
        VolumeSpec::Uniform(f64::INFINITY).to_volume_list(2, &linear),
        Err(ValidationError::NonFinite { .. })
    ));
    assert_eq!(
        VolumeSpec::Uniform(10.0).to_volume_list(3, &linear),
        Ok(vec![10.0; 3])
    );
}

proptest! {
    #[test]
    fn prop_split_pieces_fit_and_sum(volume in 0.0f64..5000.0, max in 1.0f64..1000.0) {
        let pieces = split_volume(volume, max);
        let total: f64 = pieces.iter().sum();

        prop_assert!(pieces.iter().all(|&p| p <= max + 1e-9));
        prop_assert!((total - volume).abs() <= 1e-9 * volume.max(1.0));
    }

    #[test]
    fn prop_split_within_ceiling_is_identity(max in 1.0f64..1000.0, fraction in 0.0f64..=1.0) {
        let volume = max * fraction;
        prop_assert_eq!(split_volume(volume, max), vec![volume]);
    }

    #[test]
    fn prop_linear_gradient_stays_in_bounds(
        min in 0.0f64..500.0,
        max in 0.0f64..500.0,
        total in 1usize..50,
    ) {
        let volumes = volume_gradient(min, max, total, &GradientFunction::linear());
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };

        prop_assert_eq!(volumes.len(), total);
        prop_assert_eq!(volumes[0], min);
        if total > 1 {
            prop_assert_eq!(volumes[total - 1], max);
        }
        prop_assert!(volumes.iter().all(|&v| v >= lo - 1e-9 && v <= hi + 1e-9));
    }
}
