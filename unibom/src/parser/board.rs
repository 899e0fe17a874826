//! KiCad board reader
//!
//! Parses `.kicad_pcb` files (KiCad 5 `module` and KiCad 6+ `footprint`
//! elements) into placement records.
//!
//! Key format details:
//! - Coordinates in the file are millimetres, angles are degrees
//! - Pad `at` angles already include the footprint orientation
//! - Graphic items inside a footprint are stored unrotated, relative to its anchor
//!
//! Records are converted to KiCad's internal units (nanometres and tenths of
//! a degree) so the merge works on the same numbers pcbnew reports.

use std::path::Path;

use thiserror::Error;

use crate::parser::schema::{Board, FootprintId, ModuleRecord, MountType, Side};
use crate::parser::sexp::{parse_document, ParseError, SExp};

/// Nanometres per millimetre.
pub const NM_PER_MM: f64 = 1_000_000.0;
/// Native angle units per degree.
pub const DECIDEGREES_PER_DEGREE: f64 = 10.0;

#[derive(Debug, Error)]
pub enum BoardParseError {
    #[error("Cannot read board {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("Invalid board format: {0}")]
    InvalidFormat(String),
}

/// Axis-aligned box accumulated in board millimetres.
#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    min: (f64, f64),
    max: (f64, f64),
}

impl BoundingBox {
    fn at(x: f64, y: f64) -> Self {
        Self {
            min: (x, y),
            max: (x, y),
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.min = (self.min.0.min(x), self.min.1.min(y));
        self.max = (self.max.0.max(x), self.max.1.max(y));
    }

    fn include_extent(&mut self, (cx, cy): (f64, f64), (hx, hy): (f64, f64)) {
        self.include(cx - hx, cy - hy);
        self.include(cx + hx, cy + hy);
    }

    fn width(&self) -> f64 {
        self.max.0 - self.min.0
    }

    fn height(&self) -> f64 {
        self.max.1 - self.min.1
    }
}

/// Rotate a footprint-local point into board orientation (y axis points down).
fn rotate(x: f64, y: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (x * cos + y * sin, -x * sin + y * cos)
}

fn to_nm(mm: f64) -> i64 {
    (mm * NM_PER_MM).round() as i64
}

pub struct BoardParser;

impl BoardParser {
    pub fn parse_board(path: &Path) -> Result<Board, BoardParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| BoardParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut board = Self::parse_board_str(&content)?;
        board.source = path.to_path_buf();
        Ok(board)
    }

    pub fn parse_board_str(content: &str) -> Result<Board, BoardParseError> {
        let root = parse_document(content)?;

        match root.tag() {
            Some("kicad_pcb") => {}
            Some(other) => {
                return Err(BoardParseError::InvalidFormat(format!(
                    "Expected kicad_pcb, found {}",
                    other
                )))
            }
            None => {
                return Err(BoardParseError::InvalidFormat(
                    "Expected kicad_pcb root".to_string(),
                ))
            }
        }

        let output_directory = root
            .child("setup")
            .and_then(|setup| setup.child("pcbplotparams"))
            .and_then(|params| params.value_of("outputdirectory"))
            .unwrap_or("")
            .to_string();

        let mut modules = Vec::new();
        for item in root.as_list().unwrap_or(&[]).iter().skip(1) {
            if matches!(item.tag(), Some("footprint") | Some("module")) {
                match Self::parse_module(item) {
                    Ok(module) => modules.push(module),
                    Err(e) => tracing::warn!("Skipping malformed footprint: {}", e),
                }
            }
        }

        Ok(Board {
            source: Default::default(),
            version: root.value_of("version").map(str::to_string),
            modules,
            output_directory,
        })
    }

    fn parse_module(sexp: &SExp) -> Result<ModuleRecord, BoardParseError> {
        let id = sexp
            .atom_at(1)
            .ok_or_else(|| BoardParseError::InvalidFormat("Footprint without identifier".to_string()))?;
        let (x, y, rot) = Self::parse_at(sexp).ok_or_else(|| {
            BoardParseError::InvalidFormat(match sexp.child("at") {
                Some(at) => format!("Footprint {} has malformed position {}", id, at),
                None => format!("Footprint {} has no position", id),
            })
        })?;

        let side = match sexp.value_of("layer") {
            Some("B.Cu") => Side::Bottom,
            _ => Side::Top,
        };

        let mount_type = Self::mount_type(sexp);
        let reference = Self::reference(sexp).unwrap_or_default();
        let bbox = Self::footprint_rect(sexp, (x, y), rot);

        Ok(ModuleRecord {
            reference,
            position: (to_nm(x), to_nm(y)),
            orientation: rot * DECIDEGREES_PER_DEGREE,
            side,
            footprint: FootprintId::parse(id),
            bounding_size: (to_nm(bbox.width()), to_nm(bbox.height())),
            mount_type,
        })
    }

    fn mount_type(sexp: &SExp) -> MountType {
        let Some(attr) = sexp.child("attr") else {
            return MountType::Default;
        };
        let flags = attr.flags();
        if flags
            .iter()
            .any(|f| matches!(*f, "virtual" | "board_only" | "exclude_from_pos_files"))
        {
            MountType::Virtual
        } else if flags.contains(&"smd") {
            MountType::Insert
        } else {
            MountType::Default
        }
    }

    /// `(property "Reference" "R1" ...)` on KiCad 6+, `(fp_text reference R1 ...)` before.
    fn reference(sexp: &SExp) -> Option<String> {
        sexp.children("property")
            .find(|p| p.atom_at(1) == Some("Reference"))
            .and_then(|p| p.atom_at(2))
            .or_else(|| {
                sexp.children("fp_text")
                    .find(|t| t.atom_at(1) == Some("reference"))
                    .and_then(|t| t.atom_at(2))
            })
            .map(str::to_string)
    }

    fn parse_xy(sexp: &SExp) -> Option<(f64, f64)> {
        let x = sexp.atom_at(1)?.parse().ok()?;
        let y = sexp.atom_at(2)?.parse().ok()?;
        Some((x, y))
    }

    fn parse_at(sexp: &SExp) -> Option<(f64, f64, f64)> {
        let at = sexp.child("at")?;
        let (x, y) = Self::parse_xy(at)?;
        let rot = at.atom_at(3).and_then(|r| r.parse().ok()).unwrap_or(0.0);
        Some((x, y, rot))
    }

    fn point(sexp: &SExp, key: &str) -> Option<(f64, f64)> {
        sexp.child(key).and_then(Self::parse_xy)
    }

    /// Bounding rectangle of pads and graphic items once the footprint is rotated.
    fn footprint_rect(sexp: &SExp, anchor: (f64, f64), rot: f64) -> BoundingBox {
        let mut bbox = BoundingBox::at(anchor.0, anchor.1);
        let place = |(lx, ly): (f64, f64)| {
            let (dx, dy) = rotate(lx, ly, rot);
            (anchor.0 + dx, anchor.1 + dy)
        };

        for pad in sexp.children("pad") {
            let Some((px, py, pad_rot)) = Self::parse_at(pad) else {
                continue;
            };
            let (w, h) = pad
                .child("size")
                .and_then(Self::parse_xy)
                .unwrap_or((0.0, 0.0));
            let (sin, cos) = pad_rot.to_radians().sin_cos();
            let half = (
                (w / 2.0 * cos).abs() + (h / 2.0 * sin).abs(),
                (w / 2.0 * sin).abs() + (h / 2.0 * cos).abs(),
            );
            bbox.include_extent(place((px, py)), half);
        }

        for item in sexp.as_list().unwrap_or(&[]) {
            match item.tag() {
                Some("fp_line") | Some("fp_arc") => {
                    for key in ["start", "mid", "end"] {
                        if let Some(p) = Self::point(item, key) {
                            let (x, y) = place(p);
                            bbox.include(x, y);
                        }
                    }
                }
                Some("fp_rect") => {
                    if let (Some(a), Some(b)) = (Self::point(item, "start"), Self::point(item, "end")) {
                        for corner in [a, (a.0, b.1), b, (b.0, a.1)] {
                            let (x, y) = place(corner);
                            bbox.include(x, y);
                        }
                    }
                }
                Some("fp_circle") => {
                    if let (Some(c), Some(e)) = (Self::point(item, "center"), Self::point(item, "end")) {
                        let r = ((e.0 - c.0).powi(2) + (e.1 - c.1).powi(2)).sqrt();
                        bbox.include_extent(place(c), (r, r));
                    }
                }
                Some("fp_poly") => {
                    if let Some(pts) = item.child("pts") {
                        for xy in pts.children("xy") {
                            if let Some(p) = Self::parse_xy(xy) {
                                let (x, y) = place(p);
                                bbox.include(x, y);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD_V5: &str = r#"(kicad_pcb (version 20171130) (host pcbnew 5.1.9)
  (setup
    (pcbplotparams (outputdirectory "gerbers/")))
  (module Resistor_SMD:R_0603_1608Metric (layer F.Cu) (tedit 5B301BBD) (tstamp 5F2B1C3A)
    (at 110 60 90)
    (attr smd)
    (fp_text reference R1 (at 0 -1.43 90) (layer F.SilkS))
    (fp_line (start -0.8 0.4) (end 0.8 0.4) (layer F.Fab) (width 0.1))
    (fp_line (start 0.8 -0.4) (end -0.8 -0.4) (layer F.Fab) (width 0.1))
    (pad 1 smd roundrect (at -0.7875 0 90) (size 0.875 0.95) (layers F.Cu F.Paste F.Mask))
    (pad 2 smd roundrect (at 0.7875 0 90) (size 0.875 0.95) (layers F.Cu F.Paste F.Mask)))
  (module MountingHole:MountingHole_3.2mm_M3 (layer F.Cu)
    (at 10 10)
    (attr virtual)
    (fp_text reference H1 (at 0 -4.2) (layer F.SilkS)))
  (module Connector_PinHeader_2.54mm:PinHeader_1x02 (layer B.Cu)
    (at 20 30 180)
    (fp_text reference J1 (at 0 -2.33) (layer B.SilkS))))"#;

    const BOARD_V6: &str = r#"(kicad_pcb (version 20221018) (generator pcbnew)
  (setup (pcbplotparams (outputdirectory "")))
  (footprint "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm" (layer "B.Cu")
    (at 100.5 50.25)
    (property "Reference" "U1")
    (attr smd)
    (fp_rect (start -2 -2.5) (end 2 2.5) (layer "B.Fab")))
  (footprint "TestPoint:TestPoint_Pad_D1.0mm" (layer "F.Cu")
    (at 5 5)
    (property "Reference" "TP1")
    (attr smd exclude_from_pos_files)))"#;

    #[test]
    fn test_parse_legacy_modules() {
        let board = BoardParser::parse_board_str(BOARD_V5).unwrap();
        assert_eq!(board.output_directory, "gerbers/");
        assert_eq!(board.modules.len(), 3);

        let r1 = &board.modules[0];
        assert_eq!(r1.reference, "R1");
        assert_eq!(r1.position, (110_000_000, 60_000_000));
        assert_eq!(r1.orientation, 900.0);
        assert_eq!(r1.side, Side::Top);
        assert_eq!(r1.mount_type, MountType::Insert);
        assert_eq!(r1.footprint.to_string(), "Resistor_SMD:R_0603_1608Metric");

        assert_eq!(board.modules[1].mount_type, MountType::Virtual);
        assert_eq!(board.modules[2].mount_type, MountType::Default);
        assert_eq!(board.modules[2].side, Side::Bottom);
    }

    #[test]
    fn test_rotated_footprint_rect() {
        let board = BoardParser::parse_board_str(BOARD_V5).unwrap();
        // Pads span 2.45 x 0.875 unrotated; at 90 degrees the box turns on its side.
        let (w, h) = board.modules[0].bounding_size;
        assert!((w - 950_000).abs() <= 1, "width {}", w);
        assert!((h - 2_450_000).abs() <= 1, "height {}", h);
    }

    #[test]
    fn test_parse_modern_footprints() {
        let board = BoardParser::parse_board_str(BOARD_V6).unwrap();
        assert_eq!(board.output_directory, "");
        let u1 = &board.modules[0];
        assert_eq!(u1.reference, "U1");
        assert_eq!(u1.position, (100_500_000, 50_250_000));
        assert_eq!(u1.side, Side::Bottom);
        assert_eq!(u1.bounding_size, (4_000_000, 5_000_000));
        assert_eq!(board.modules[1].mount_type, MountType::Virtual);
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(matches!(
            BoardParser::parse_board_str("(export (version D))"),
            Err(BoardParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            BoardParser::parse_board_str("(kicad_pcb"),
            Err(BoardParseError::SExpParse(_))
        ));
    }

    #[test]
    fn test_malformed_position_is_reported_and_skipped() {
        let module = parse_document(
            "(module Resistor_SMD:R_0603 (layer F.Cu) (at abc 60) (fp_text reference R7 (at 0 0)))",
        )
        .unwrap();
        let err = BoardParser::parse_module(&module).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid board format: Footprint Resistor_SMD:R_0603 has malformed position (at abc 60)"
        );

        let board = BoardParser::parse_board_str(
            "(kicad_pcb (version 20171130) (module Lib:X (layer F.Cu) (at abc 60)) (module Lib:Y (layer F.Cu) (at 1 2)))",
        )
        .unwrap();
        assert_eq!(board.modules.len(), 1);
        assert_eq!(board.modules[0].footprint.to_string(), "Lib:Y");
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let (x, y) = rotate(1.0, 0.0, 90.0);
        assert!(x.abs() < 1e-9);
        assert!((y + 1.0).abs() < 1e-9);
    }
}
