use geo::{MultiPolygon, polygon};
use precinct_shifts::{
    AttrValue, Crosswalk, CrosswalkOptions, Crs, HarmonizeError, PolygonCollection, PopulationWeights,
    WeightMethod, build_crosswalk,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
    ]])
}

fn layer(crs: Crs, field: &str, cells: Vec<(&str, MultiPolygon<f64>)>) -> PolygonCollection {
    let (records, shapes): (Vec<_>, Vec<_>) = cells.into_iter()
        .map(|(id, shape)| (vec![AttrValue::Text(id.into())], shape))
        .unzip();
    PolygonCollection::new(crs, shapes, vec![field.into()], records).unwrap()
}

fn area_crosswalk(past: &PolygonCollection, base: &PolygonCollection) -> Crosswalk {
    build_crosswalk(past, base, "OLD", "NEW", WeightMethod::Area, None, &CrosswalkOptions::default()).unwrap()
}

fn frac(crosswalk: &Crosswalk, past: &str, base: &str) -> Option<f64> {
    crosswalk.entries().iter()
        .find(|e| e.past_id == past && e.base_id == base)
        .map(|e| e.frac)
}

fn quadrants() -> PolygonCollection {
    layer(Crs::Epsg(3734), "NEW", vec![
        ("Q1", rect(0.0, 0.0, 1.0, 1.0)),
        ("Q2", rect(1.0, 0.0, 2.0, 1.0)),
        ("Q3", rect(0.0, 1.0, 1.0, 2.0)),
        ("Q4", rect(1.0, 1.0, 2.0, 2.0)),
    ])
}

#[test]
fn square_over_four_quadrants_splits_equally() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![("A", rect(0.0, 0.0, 2.0, 2.0))]);
    let crosswalk = area_crosswalk(&past, &quadrants());

    assert_eq!(crosswalk.len(), 4);
    for entry in crosswalk.entries() {
        assert_eq!(entry.past_id, "A");
        assert!((entry.frac - 0.25).abs() < 1e-9);
    }
}

#[test]
fn proportional_split() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![("A", rect(0.0, 0.0, 10.0, 1.0))]);
    let base = layer(Crs::Epsg(3734), "NEW", vec![
        ("L", rect(0.0, 0.0, 6.0, 1.0)),
        ("R", rect(6.0, 0.0, 10.0, 1.0)),
    ]);
    let crosswalk = area_crosswalk(&past, &base);

    assert!((frac(&crosswalk, "A", "L").unwrap() - 0.6).abs() < 0.01);
    assert!((frac(&crosswalk, "A", "R").unwrap() - 0.4).abs() < 0.01);
}

#[test]
fn fractions_sum_to_one_per_covered_precinct() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![
        ("A", rect(0.0, 0.0, 1.5, 2.0)),
        ("B", rect(1.5, 0.0, 2.0, 2.0)),
    ]);
    let crosswalk = area_crosswalk(&past, &quadrants());

    for id in ["A", "B"] {
        let sum = crosswalk.entries().iter().filter(|e| e.past_id == id).map(|e| e.frac).sum::<f64>();
        assert!((sum - 1.0).abs() < 1e-9, "{id} sums to {sum}");
    }
    assert!(crosswalk.entries().iter().all(|e| e.frac > 0.0 && e.frac <= 1.0));
}

#[test]
fn disjoint_geometries_produce_no_rows() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![("A", rect(10.0, 10.0, 11.0, 11.0))]);
    assert!(area_crosswalk(&past, &quadrants()).is_empty());
}

#[test]
fn construction_is_deterministic() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![
        ("A", rect(0.0, 0.0, 1.5, 2.0)),
        ("B", rect(1.5, 0.0, 2.0, 2.0)),
    ]);
    let base = quadrants();
    assert_eq!(area_crosswalk(&past, &base).entries(), area_crosswalk(&past, &base).entries());
}

#[test]
fn crs_mismatch_is_rejected() {
    let past = layer(Crs::Epsg(3735), "OLD", vec![("A", rect(0.0, 0.0, 2.0, 2.0))]);
    let err = build_crosswalk(&past, &quadrants(), "OLD", "NEW", WeightMethod::Area, None, &CrosswalkOptions::default())
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::CrsMismatch { .. })));
}

#[test]
fn population_weighting_requires_blocks() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![("A", rect(0.0, 0.0, 2.0, 2.0))]);
    let err = build_crosswalk(&past, &quadrants(), "OLD", "NEW", WeightMethod::Pop, None, &CrosswalkOptions::default())
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::MissingWeightInputs)));
}

#[test]
fn population_weighting_follows_people_not_area() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![("A", rect(0.0, 0.0, 2.0, 1.0))]);
    let base = layer(Crs::Epsg(3734), "NEW", vec![
        ("W", rect(0.0, 0.0, 1.0, 1.0)),
        ("E", rect(1.0, 0.0, 2.0, 1.0)),
    ]);
    let blocks = PolygonCollection::new(
        Crs::Epsg(3734),
        vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 2.0, 1.0)],
        vec!["POP".into()],
        vec![vec![AttrValue::Number(90.0)], vec![AttrValue::Number(10.0)]],
    ).unwrap();

    let weights = PopulationWeights { blocks: &blocks, pop_field: "POP" };
    let crosswalk = build_crosswalk(&past, &base, "OLD", "NEW", WeightMethod::Pop, Some(weights), &CrosswalkOptions::default())
        .unwrap();

    assert_eq!(crosswalk.method(), WeightMethod::Pop);
    assert!((frac(&crosswalk, "A", "W").unwrap() - 0.9).abs() < 1e-9);
    assert!((frac(&crosswalk, "A", "E").unwrap() - 0.1).abs() < 1e-9);
}

#[test]
fn persisted_crosswalk_reads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("crosswalks/crosswalk_2020_to_2024.csv");
    let past = layer(Crs::Epsg(3734), "OLD", vec![("A", rect(0.0, 0.0, 2.0, 2.0))]);
    let crosswalk = area_crosswalk(&past, &quadrants());

    crosswalk.write_csv(&path).unwrap();
    let read = Crosswalk::read_csv(&path, WeightMethod::Area, "OLD", "NEW").unwrap();
    assert_eq!(read.len(), crosswalk.len());
    for (a, b) in read.entries().iter().zip(crosswalk.entries()) {
        assert_eq!((&a.past_id, &a.base_id), (&b.past_id, &b.base_id));
        assert!((a.frac - b.frac).abs() < 1e-9);
    }
}

#[test]
fn unpopulated_precincts_fall_back_to_area_weights() {
    let past = layer(Crs::Epsg(3734), "OLD", vec![
        ("A", rect(0.0, 0.0, 1.0, 1.0)),
        ("B", rect(1.0, 0.0, 3.0, 1.0)),
    ]);
    let base = layer(Crs::Epsg(3734), "NEW", vec![
        ("X", rect(0.0, 0.0, 2.0, 1.0)),
        ("Y", rect(2.0, 0.0, 3.0, 1.0)),
    ]);
    // A non-numeric population counts as zero.
    let blocks = PolygonCollection::new(
        Crs::Epsg(3734),
        vec![rect(0.0, 0.0, 1.0, 1.0), rect(1.0, 0.0, 3.0, 1.0)],
        vec!["POP".into()],
        vec![vec![AttrValue::Number(50.0)], vec![AttrValue::Text("n/a".into())]],
    ).unwrap();

    let weights = PopulationWeights { blocks: &blocks, pop_field: "POP" };
    let crosswalk = build_crosswalk(&past, &base, "OLD", "NEW", WeightMethod::Pop, Some(weights), &CrosswalkOptions::default())
        .unwrap();

    assert_eq!(crosswalk.len(), 3);
    assert!((frac(&crosswalk, "A", "X").unwrap() - 1.0).abs() < 1e-9);
    assert!((frac(&crosswalk, "B", "X").unwrap() - 0.5).abs() < 1e-9);
    assert!((frac(&crosswalk, "B", "Y").unwrap() - 0.5).abs() < 1e-9);
}
