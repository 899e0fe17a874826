//! End-to-end conversion on the demo project

use std::fs;
use std::path::PathBuf;

use unibom::core::OutputTarget;
use unibom::prelude::*;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn convert_to(dir: &tempfile::TempDir, format: OutputFormat) -> (ConvertSummary, String) {
    let output = dir.path().join("out.csv");
    let options = ConvertOptions {
        netlist: fixture_path("demo.net"),
        output: Some(OutputTarget::File(output.clone())),
        format,
        ..Default::default()
    };
    let summary = UnibomCore::convert(&options).expect("Should convert demo project");
    let text = fs::read_to_string(output).expect("Should write output");
    (summary, text)
}

#[test]
fn test_generic_demo_output() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, text) = convert_to(&dir, OutputFormat::Generic);

    assert_eq!(summary.rows_written, 5);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Reference,Value,Description,Footprint,PosX,PosY,Rotation,Side,MFR,MPN,OctopartID,Datasheet",
            "C1,100nF,Unpolarized capacitor,Capacitor_SMD:C_0603_1608Metric,110.0,-60.0,0.0,top,Murata,GRM188R71H104KA93D,3f0e9a,~",
            "C10,10uF,Unpolarized capacitor,Capacitor_SMD:C_0805_2012Metric,,,,,Samsung,CL21A106KAYNNNE,,~",
            "J1,Conn_01x02,\"Generic connector, single row, 01x02\",Connector_PinHeader_2.54mm:PinHeader_1x02_P2.54mm_Vertical,,,,,,,,~",
            "R1,10k,Resistor,Resistor_SMD:R_0603_1608Metric,120.5,-62.25,90.0,top,Yageo,RC0603FR-0710KL,,http://www.yageo.com/documents/recent/PYu-RC_Group_51_RoHS_L_10.pdf",
            "U1,STM32F103C8Tx,\"ARM Cortex-M3 MCU, 64KB flash\",Package_QFP:LQFP-48_7x7mm_P0.5mm,130.0,-70.0,180.0,bottom,STMicroelectronics,ABC123,,http://www.st.com/st-web-ui/static/active/en/resource/technical/document/datasheet/CD00161566.pdf",
        ]
    );
}

#[test]
fn test_demo_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, _) = convert_to(&dir, OutputFormat::Generic);

    let warnings: Vec<String> = summary.outcome.warnings.iter().map(|w| w.to_string()).collect();
    assert!(warnings.contains(&"PCB Skipping \"R9\"".to_string()));
    assert!(warnings.iter().any(|w| w.starts_with("PCB overriding C1 Footprint")));
    // Excluded records are not warnings.
    assert!(!warnings.iter().any(|w| w.contains("MECH1") || w.contains("NT1") || w.contains("R2")));
}

#[test]
fn test_macrofab_demo_output() {
    let dir = tempfile::tempdir().unwrap();
    let (_, text) = convert_to(&dir, OutputFormat::Macrofab);

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Reference\tPosX\tPosY\tRotation\tSide\tType\tXSize\tYSize\tValue\tFootprint\tPopulate\tDISTPN2"
    );
    let row = |r: &str| -> Vec<String> {
        lines
            .iter()
            .find(|l| l.starts_with(&format!("{}\t", r)))
            .unwrap()
            .split('\t')
            .map(str::to_string)
            .collect()
    };

    let u1 = row("U1");
    assert_eq!(u1[3], "180");
    assert_eq!(u1[4], "2");
    assert_eq!(u1[5], "1");
    assert_eq!(u1[10], "1");
    assert_eq!(u1[11], "ABC123");

    let r1 = row("R1");
    assert_eq!(r1[11], "311-10.0KHRCT-ND");
    let x_size: f64 = r1[6].parse().unwrap();
    let y_size: f64 = r1[7].parse().unwrap();
    assert!((x_size - 2.45).abs() < 1e-9);
    assert!((y_size - 0.95).abs() < 1e-9);

    // Virtual modules leave placement empty; netlist columns remain.
    let c10 = row("C10");
    assert_eq!(c10[1], "");
    assert_eq!(c10[11], "CL21A106KAYNNNE");
}

#[test]
fn test_output_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (_, first) = convert_to(&dir, OutputFormat::Macrofab);
    let (_, second) = convert_to(&dir, OutputFormat::Macrofab);
    assert_eq!(first, second);
}

#[test]
fn test_default_output_lands_in_plot_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture_path("demo.net"), dir.path().join("demo.net")).unwrap();
    fs::copy(fixture_path("demo.kicad_pcb"), dir.path().join("demo.kicad_pcb")).unwrap();

    let options = ConvertOptions {
        netlist: dir.path().join("demo.net"),
        ..Default::default()
    };
    let summary = UnibomCore::convert(&options).expect("Should convert");

    let expected = dir.path().join("gerbers").join("demo-bom-xyrs.csv");
    assert!(expected.exists());
    assert!(matches!(summary.output, OutputTarget::File(ref p) if p.ends_with("gerbers/demo-bom-xyrs.csv")));
}

#[test]
fn test_missing_board_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture_path("demo.net"), dir.path().join("demo.net")).unwrap();

    let options = ConvertOptions {
        netlist: dir.path().join("demo.net"),
        ..Default::default()
    };
    assert!(matches!(UnibomCore::convert(&options), Err(UnibomError::Board(_))));
}

#[test]
fn test_missing_netlist_is_fatal() {
    let options = ConvertOptions {
        netlist: PathBuf::from("does_not_exist.net"),
        board: Some(fixture_path("demo.kicad_pcb")),
        ..Default::default()
    };
    assert!(matches!(UnibomCore::convert(&options), Err(UnibomError::Netlist(_))));
}

#[test]
fn test_custom_prune_rules() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");
    let options = ConvertOptions {
        netlist: fixture_path("demo.net"),
        output: Some(OutputTarget::File(output.clone())),
        prune: PruneRules {
            reference: vec!["J.*".to_string()],
            footprint: Vec::new(),
            ..Default::default()
        },
        ..Default::default()
    };
    let summary = UnibomCore::convert(&options).unwrap();
    let refs: Vec<&str> = summary.outcome.records.keys().map(String::as_str).collect();
    assert_eq!(refs, vec!["C1", "C10", "MECH1", "NT1", "R1", "U1"]);
}
