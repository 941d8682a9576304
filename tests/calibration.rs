use approx::assert_abs_diff_eq;
use fieldtrack::correspondence::{CorrespondencePoint, CorrespondenceStore, MarkerObservation};
use fieldtrack::field::{FieldGeometry, MarkerMapping};
use fieldtrack::{Calibrator, Degeneracy, Error, FieldPoint, PixelPoint};
use nalgebra::{Matrix3, Vector3};

/// Field feet to image pixels for a camera looking down the near sideline.
fn camera() -> Matrix3<f64> {
    Matrix3::new(
        3.0, 0.4, 100.0, //
        0.0, 2.5, 150.0, //
        0.0, 0.001, 1.0,
    )
}

fn to_image(p: FieldPoint) -> PixelPoint {
    let v = camera() * Vector3::new(p.x, p.y, 1.0);
    PixelPoint::new(v[0] / v[2], v[1] / v[2])
}

fn corr(ix: f64, iy: f64, fx: f64, fy: f64) -> CorrespondencePoint {
    CorrespondencePoint::new(PixelPoint::new(ix, iy), FieldPoint::new(fx, fy))
}

#[test]
fn four_corner_scenario_lands_mid_field() {
    let store = CorrespondenceStore::from_points(vec![
        corr(100.0, 100.0, 50.0, 40.0),
        corr(100.0, 500.0, 50.0, 120.0),
        corr(900.0, 100.0, 150.0, 40.0),
        corr(900.0, 500.0, 150.0, 120.0),
    ]);

    let report = Calibrator::default().calibrate(&store).unwrap();
    assert!(report.within_tolerance());

    let p = report.homography.project(PixelPoint::new(500.0, 300.0)).unwrap();
    assert_abs_diff_eq!(p.x, 100.0, epsilon = 1.0);
    assert_abs_diff_eq!(p.y, 80.0, epsilon = 1.0);
}

#[test]
fn calibrates_from_yard_markers() {
    let mapping = MarkerMapping::default();
    let geometry = FieldGeometry::default();

    let observations: Vec<MarkerObservation> = ["nl1", "nr1", "fl2", "fr2", "nl3"]
        .iter()
        .map(|label| {
            let resolved = label
                .parse::<fieldtrack::YardMarkerLabel>()
                .unwrap()
                .resolve(&mapping, &geometry);

            MarkerObservation {
                label: label.to_string(),
                image_point: to_image(resolved.field_point),
                confidence: 0.9,
            }
        })
        .collect();

    let store = CorrespondenceStore::from_markers(&observations, &mapping, &geometry).unwrap();
    assert_eq!(store.yard_lines().len(), 3);

    let report = Calibrator::default().calibrate(&store).unwrap();
    assert!(report.within_tolerance());
    assert!(report.rms_ft < 1e-3);

    // every correspondence re-projects onto its field point
    for c in store.points() {
        let p = report.homography.project(c.image_point).unwrap();
        assert_abs_diff_eq!(p.x, c.field_point.x, epsilon = 1e-3);
        assert_abs_diff_eq!(p.y, c.field_point.y, epsilon = 1e-3);
    }

    // and a point that was never observed lands where the camera put it
    let mid = FieldPoint::new(180.0, 80.0);
    let p = report.homography.project(to_image(mid)).unwrap();
    assert_abs_diff_eq!(p.x, mid.x, epsilon = 1e-3);
    assert_abs_diff_eq!(p.y, mid.y, epsilon = 1e-3);

    let back = report.homography.unproject(mid).unwrap();
    let expected = to_image(mid);
    assert_abs_diff_eq!(back.x, expected.x, epsilon = 1e-3);
    assert_abs_diff_eq!(back.y, expected.y, epsilon = 1e-3);
}

#[test]
fn three_points_are_never_enough() {
    let store = CorrespondenceStore::from_points(vec![
        corr(100.0, 100.0, 50.0, 40.0),
        corr(100.0, 500.0, 50.0, 120.0),
        corr(900.0, 100.0, 150.0, 40.0),
    ]);

    assert!(matches!(
        Calibrator::default().calibrate(&store),
        Err(Error::InsufficientPoints { needed: 4, got: 3 })
    ));
}

#[test]
fn collinear_points_are_rejected() {
    let store = CorrespondenceStore::from_points(vec![
        corr(100.0, 100.0, 30.0, 40.0),
        corr(200.0, 200.0, 60.0, 60.0),
        corr(300.0, 300.0, 90.0, 80.0),
        corr(400.0, 400.0, 120.0, 100.0),
        corr(500.0, 500.0, 150.0, 120.0),
    ]);

    match Calibrator::default().calibrate(&store) {
        Err(Error::DegenerateConfiguration(Degeneracy::CollinearImagePoints)) => {}
        other => panic!("expected collinear rejection, got {:?}", other),
    }
}

#[test]
fn single_yard_line_is_rejected() {
    let store = CorrespondenceStore::from_points(vec![
        corr(100.0, 100.0, 150.0, 40.0),
        corr(120.0, 500.0, 150.0, 120.0),
        corr(110.0, 300.0, 150.0, 80.0),
        corr(300.0, 250.0, 151.0, 70.0),
    ]);

    assert!(matches!(
        Calibrator::default().calibrate(&store),
        Err(Error::DegenerateConfiguration(Degeneracy::SingleYardLine {
            yard_line: 50
        }))
    ));
}
