/// Integration tests for the `.frd` reader
///
/// The result files are assembled record by record so every field sits at
/// the column CalculiX writes it to.
use std::io::Write;

use approx::assert_relative_eq;
use ccx_results::{
    AnalysisType, FrdEntity, FrdResult, ResultError, ResultQuery, parse_nodal_file, stress_tools,
};
use tempfile::NamedTempFile;

fn write_frd(lines: &[String]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".frd")
        .tempfile()
        .expect("create temp .frd file");
    for line in lines {
        writeln!(file, "{line}").expect("write .frd record");
    }
    file
}

fn step_record(total_increment: u32, step_no: u32) -> String {
    format!("    1PSTEP{:>25}{:>12}{:>12}", total_increment, 1, step_no)
}

fn block_header(step_time: f64, analysis_code: u32, total_increment: u32) -> String {
    format!(
        "  100CL  101{:>12.5E}{:>12}{:20}{:>2}{:>5}{:10}{:>2}",
        step_time, 2, "", analysis_code, total_increment, "", 1
    )
}

fn node_record(id: u32, components: &[f64]) -> String {
    let mut line = format!(" -1{id:>10}");
    for c in components {
        line.push_str(&format!("{c:>12.5E}"));
    }
    line
}

fn disp_block(step_time: f64, total_increment: u32, scale: f64) -> Vec<String> {
    vec![
        block_header(step_time, 0, total_increment),
        " -4  DISP        4    1".to_string(),
        " -5  D1          1    2    1    0".to_string(),
        " -5  D2          1    2    2    0".to_string(),
        " -5  D3          1    2    3    0".to_string(),
        " -5  ALL         1    2    0    0    1ALL".to_string(),
        node_record(1, &[1.0 * scale, 0.0, 0.0]),
        node_record(2, &[2.0 * scale, 0.0, -1.0 * scale]),
        " -3".to_string(),
    ]
}

fn mesh_records() -> Vec<String> {
    vec![
        "    1C".to_string(),
        "    1UUSER".to_string(),
        "    2C                             2                                     1".to_string(),
        " -1         1 0.00000E+00 0.00000E+00 0.00000E+00".to_string(),
        " -1         2 1.00000E+00 0.00000E+00 0.00000E+00".to_string(),
        " -3".to_string(),
    ]
}

fn two_step_file() -> Vec<String> {
    let mut lines = mesh_records();
    lines.push(step_record(1, 1));
    lines.extend(disp_block(1.0, 1, 1.0));
    lines.push(step_record(5, 2));
    lines.extend(disp_block(2.0, 5, 2.0));
    lines.push(step_record(7, 2));
    lines.extend(disp_block(3.0, 7, 3.0));
    lines.push("9999".to_string());
    lines
}

#[test]
fn test_increments_renumbered_within_step() {
    let file = write_frd(&two_step_file());
    let frd = parse_nodal_file(file.path()).expect("parse .frd");

    assert_eq!(frd.result_sets().len(), 3);
    let step2 = frd.get_result_sets_by(&ResultQuery::new().step_no(2));
    assert_eq!(step2.len(), 2);
    assert_eq!(step2[0].step_increment_no, 1);
    assert_eq!(step2[1].step_increment_no, 3);

    let first = &frd.result_sets()[0];
    assert_eq!(first.step_no, 1);
    assert_eq!(first.step_increment_no, 1);
    assert_eq!(first.analysis_type, AnalysisType::Static);
    assert_eq!(first.component_names, vec!["D1", "D2", "D3"]);
}

#[test]
fn test_mesh_blocks_are_not_results() {
    let file = write_frd(&two_step_file());
    let frd = FrdResult::from_file(file.path()).unwrap();
    assert!(frd.result_sets().iter().all(|rs| rs.entity == FrdEntity::DISP));
    assert_eq!(frd.get_available_times(), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_missing_ids_are_zero_filled() {
    let file = write_frd(&two_step_file());
    let frd = parse_nodal_file(file.path()).unwrap();
    let rs = frd.get_result_set_by_entity_and_time(FrdEntity::DISP, 2.1, None).unwrap();
    assert_eq!(rs.step_time, 2.0);

    let values = rs.get_values_by_ids(&[2, 99, 1]).unwrap().into_rows().unwrap();
    assert_eq!(values.shape(), (3, 3));
    assert_relative_eq!(values[(0, 0)], 4.0);
    assert_relative_eq!(values[(0, 2)], -2.0);
    assert_eq!(values.row(1).iter().copied().collect::<Vec<_>>(), vec![0.0; 3]);
    assert_relative_eq!(values[(2, 0)], 2.0);
}

#[test]
fn test_step_defaults_to_one_without_step_record() {
    let file = write_frd(&disp_block(0.5, 3, 1.0));
    let frd = parse_nodal_file(file.path()).unwrap();
    let rs = &frd.result_sets()[0];
    assert_eq!(rs.step_no, 1);
    assert_eq!(rs.step_increment_no, 1);
}

#[test]
fn test_frequency_blocks() {
    let mut lines = vec![
        step_record(1, 1),
        "    1PGM                1.000000E+00".to_string(),
        "    1PGK                1.600000E+04".to_string(),
        "    1PHID                        -1".to_string(),
        "    1PSUBC                        0".to_string(),
        "    1PMODE                        1".to_string(),
    ];
    let mut mode1 = disp_block(20.13168, 1, 1.0);
    mode1[0] = block_header(20.13168, 2, 1);
    lines.extend(mode1);

    let file = write_frd(&lines);
    let frd = parse_nodal_file(file.path()).unwrap();
    let rs = &frd.result_sets()[0];
    assert_eq!(rs.analysis_type, AnalysisType::Frequency);
    assert_relative_eq!(rs.step_time, 20.13168, max_relative = 1e-5);
}

#[test]
fn test_stress_block_feeds_stress_tools() {
    let lines = vec![
        step_record(1, 1),
        block_header(1.0, 0, 1),
        " -4  STRESS      6    1".to_string(),
        " -5  SXX         1    4    1    1".to_string(),
        " -5  SYY         1    4    2    2".to_string(),
        " -5  SZZ         1    4    3    3".to_string(),
        " -5  SXY         1    4    1    2".to_string(),
        " -5  SYZ         1    4    2    3".to_string(),
        " -5  SZX         1    4    3    1".to_string(),
        node_record(1, &[100.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        node_record(2, &[0.0, 0.0, 0.0, 50.0, 0.0, 0.0]),
        " -3".to_string(),
    ];
    let file = write_frd(&lines);
    let frd = parse_nodal_file(file.path()).unwrap();
    let rs = frd.get_result_set_by_entity_and_index(FrdEntity::STRESS, 0, None).unwrap();
    assert_eq!(rs.no_components, 6);
    assert_eq!(rs.component_names[5], "SZX");

    let tensors = rs.get_values_by_ids(&[1, 2]).unwrap().into_rows().unwrap();
    let mises = stress_tools::mises_stresses(&tensors).unwrap();
    assert_relative_eq!(mises[0], 100.0, epsilon = 1e-9);
    assert_relative_eq!(mises[1], 50.0 * 3.0_f64.sqrt(), epsilon = 1e-9);

    let shear = stress_tools::max_principal_shear_stresses(&tensors).unwrap();
    assert_relative_eq!(shear[0], 50.0, epsilon = 1e-9);
    assert_relative_eq!(shear[1], 50.0, epsilon = 1e-9);
}

#[test]
fn test_binary_output_is_rejected() {
    let header = format!(
        "  100CL  101{:>12.5E}{:>12}{:20}{:>2}{:>5}{:10}{:>2}",
        1.0, 2, "", 0, 1, "", 2
    );
    let file = write_frd(&[header]);
    let err = parse_nodal_file(file.path()).unwrap_err();
    assert!(matches!(err, ResultError::UnsupportedFrdFormat(2)));
}

#[test]
fn test_export_json_of_parsed_file() {
    let file = write_frd(&two_step_file());
    let frd = parse_nodal_file(file.path()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results").join("job.json");
    frd.write_json(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["result_sets"].as_array().unwrap().len(), 3);
    assert_eq!(json["result_sets"][2]["step_increment_no"], 3);
}
