//! Recursive-descent parser over the token stream from [`crate::lexer`].

use std::path::PathBuf;

use crate::error::{DescriptionError, Result};
use crate::lexer::{tokenize, Token};
use crate::types::{ProjectionKind, ProjectionSpec, SheetDescription, SheetExtent, SheetSpec, Unit};

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect_ident(&mut self, ctx: &'static str) -> Result<String> {
        match self.bump() {
            Some(Token::Ident(s)) => Ok(s),
            Some(other) => Err(DescriptionError::Unexpected {
                expected: "identifier",
                found: format!("{other:?}"),
            }),
            None => Err(DescriptionError::UnexpectedEof(ctx)),
        }
    }

    fn expect_ident_eq(&mut self, want: &str, ctx: &'static str) -> Result<()> {
        let got = self.expect_ident(ctx)?;
        if got.eq_ignore_ascii_case(want) {
            Ok(())
        } else {
            Err(DescriptionError::Unexpected {
                expected: ctx,
                found: got,
            })
        }
    }

    fn expect_number(&mut self, ctx: &'static str) -> Result<f64> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(n),
            Some(other) => Err(DescriptionError::Unexpected {
                expected: "number",
                found: format!("{other:?}"),
            }),
            None => Err(DescriptionError::UnexpectedEof(ctx)),
        }
    }

    fn expect_lbrace(&mut self, ctx: &'static str) -> Result<()> {
        match self.bump() {
            Some(Token::LBrace) => Ok(()),
            Some(other) => Err(DescriptionError::Unexpected {
                expected: "{",
                found: format!("{other:?}"),
            }),
            None => Err(DescriptionError::UnexpectedEof(ctx)),
        }
    }

    fn at_rbrace(&self) -> bool {
        matches!(self.peek(), Some(Token::RBrace))
    }

    fn unit(&mut self, ctx: &'static str) -> Result<Unit> {
        let ident = self.expect_ident(ctx)?;
        Unit::from_keyword(&ident).ok_or(DescriptionError::UnknownUnit(ident))
    }
}

pub fn parse(input: &str) -> Result<SheetDescription> {
    let tokens = tokenize(input);
    let mut p = Parser { tokens, pos: 0 };

    let mut projection: Option<ProjectionSpec> = None;
    let mut sheet: Option<SheetSpec> = None;

    while p.peek().is_some() {
        let keyword = p.expect_ident("top-level block")?;
        match keyword.to_ascii_lowercase().as_str() {
            "projection" => projection = Some(parse_projection_block(&mut p)?),
            "sheet" => sheet = Some(parse_sheet_block(&mut p)?),
            other => {
                return Err(DescriptionError::Unexpected {
                    expected: "`projection` or `sheet`",
                    found: other.to_string(),
                })
            }
        }
    }

    let projection = projection.ok_or(DescriptionError::MissingField("projection", "document"))?;
    let sheet = sheet.ok_or(DescriptionError::MissingField("sheet", "document"))?;
    Ok(SheetDescription { projection, sheet })
}

fn parse_projection_block(p: &mut Parser) -> Result<ProjectionSpec> {
    p.expect_lbrace("projection")?;

    let mut kind: Option<ProjectionKind> = None;
    let mut origin_lon_deg = 0.0;
    let mut origin_lat_deg = 0.0;
    let mut false_origin_x_m = 0.0;
    let mut false_origin_y_m = 0.0;

    while !p.at_rbrace() {
        let keyword = p.expect_ident("projection statement")?;
        match keyword.to_ascii_lowercase().as_str() {
            "type" => {
                let ident = p.expect_ident("projection type")?;
                kind = Some(match ident.to_ascii_lowercase().as_str() {
                    "utm" => ProjectionKind::Utm,
                    "mercator" => ProjectionKind::Mercator,
                    "polar_stereographic" | "polarstereographic" => {
                        ProjectionKind::PolarStereographic
                    }
                    _ => return Err(DescriptionError::UnknownProjectionType(ident)),
                });
            }
            "origin" => {
                let lon = p.expect_number("origin longitude")?;
                let lat = p.expect_number("origin latitude")?;
                let unit = p.unit("origin unit")?;
                origin_lon_deg = unit.to_degrees(lon);
                origin_lat_deg = unit.to_degrees(lat);
            }
            "false_origin" => {
                let x = p.expect_number("false_origin x")?;
                let y = p.expect_number("false_origin y")?;
                let unit = p.unit("false_origin unit")?;
                false_origin_x_m = unit.to_meters(x);
                false_origin_y_m = unit.to_meters(y);
            }
            other => {
                return Err(DescriptionError::Unexpected {
                    expected: "`type`, `origin`, or `false_origin`",
                    found: other.to_string(),
                })
            }
        }
    }
    p.bump(); // RBrace

    let kind = kind.ok_or(DescriptionError::MissingField("type", "projection"))?;
    Ok(ProjectionSpec {
        kind,
        origin_lon_deg,
        origin_lat_deg,
        false_origin_x_m,
        false_origin_y_m,
    })
}

fn parse_sheet_block(p: &mut Parser) -> Result<SheetSpec> {
    p.expect_lbrace("sheet")?;

    let mut extent: Option<SheetExtent> = None;
    let mut spacing_e_m = 0.0;
    let mut spacing_n_m = 0.0;
    let mut backstore: Option<PathBuf> = None;

    while !p.at_rbrace() {
        let keyword = p.expect_ident("sheet statement")?;
        match keyword.to_ascii_lowercase().as_str() {
            "location" => {
                if extent.is_some() {
                    return Err(DescriptionError::AmbiguousExtent);
                }
                let lon = p.expect_number("location longitude")?;
                let lat = p.expect_number("location latitude")?;
                let width = p.expect_number("location width")?;
                let height = p.expect_number("location height")?;
                let unit = p.unit("location size unit")?;
                extent = Some(SheetExtent::CenterSize {
                    center_lon_deg: lon,
                    center_lat_deg: lat,
                    width_m: unit.to_meters(width),
                    height_m: unit.to_meters(height),
                });
            }
            "bounds" => {
                if extent.is_some() {
                    return Err(DescriptionError::AmbiguousExtent);
                }
                let sw_x = p.expect_number("bounds sw_x")?;
                let sw_y = p.expect_number("bounds sw_y")?;
                let ne_x = p.expect_number("bounds ne_x")?;
                let ne_y = p.expect_number("bounds ne_y")?;
                let unit = p.unit("bounds unit")?;
                let geographic = matches!(unit, Unit::Degrees | Unit::Minutes | Unit::Radians);
                let (sw_x, sw_y, ne_x, ne_y) = if geographic {
                    (
                        unit.to_degrees(sw_x),
                        unit.to_degrees(sw_y),
                        unit.to_degrees(ne_x),
                        unit.to_degrees(ne_y),
                    )
                } else {
                    (
                        unit.to_meters(sw_x),
                        unit.to_meters(sw_y),
                        unit.to_meters(ne_x),
                        unit.to_meters(ne_y),
                    )
                };
                extent = Some(SheetExtent::Bounds {
                    sw_x,
                    sw_y,
                    ne_x,
                    ne_y,
                    geographic,
                });
            }
            "spacing" => {
                let value = p.expect_number("spacing")?;
                let unit = p.unit("spacing unit")?;
                let meters = unit.to_meters(value);
                spacing_e_m = meters;
                spacing_n_m = meters;
            }
            "backstore" => {
                let ident = p.expect_ident("backstore path")?;
                backstore = Some(PathBuf::from(ident));
            }
            other => {
                return Err(DescriptionError::Unexpected {
                    expected: "`location`, `bounds`, `spacing`, or `backstore`",
                    found: other.to_string(),
                })
            }
        }
    }
    p.bump(); // RBrace

    let extent = extent.ok_or(DescriptionError::MissingField("location or bounds", "sheet"))?;
    Ok(SheetSpec {
        extent,
        spacing_e_m,
        spacing_n_m,
        backstore,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_center_size_sheet() {
        let src = r#"
            projection {
                type utm
                origin 15.0 45.0 degrees
                false_origin 500000 0 meters
            }
            sheet {
                location 15.1 45.05 2000 1500 meters
                spacing 1.0 meters
                backstore ./chart.sheet
            }
        "#;
        let desc = parse(src).unwrap();
        assert_eq!(desc.projection.kind, ProjectionKind::Utm);
        match desc.sheet.extent {
            SheetExtent::CenterSize {
                width_m, height_m, ..
            } => {
                assert_eq!(width_m, 2000.0);
                assert_eq!(height_m, 1500.0);
            }
            _ => panic!("expected center+size extent"),
        }
        assert_eq!(desc.sheet.backstore, Some(PathBuf::from("./chart.sheet")));
    }

    #[test]
    fn parses_bounds_sheet_in_kilometers() {
        let src = r#"
            projection { type mercator origin 0 0 degrees false_origin 0 0 meters }
            sheet {
                bounds 0 0 2 2 kilometers
                spacing 10 meters
            }
        "#;
        let desc = parse(src).unwrap();
        match desc.sheet.extent {
            SheetExtent::Bounds { ne_x, ne_y, geographic, .. } => {
                assert_eq!(ne_x, 2000.0);
                assert_eq!(ne_y, 2000.0);
                assert!(!geographic);
            }
            _ => panic!("expected bounds extent"),
        }
    }

    #[test]
    fn rejects_ambiguous_extent() {
        let src = r#"
            projection { type utm origin 0 0 degrees false_origin 0 0 meters }
            sheet {
                location 0 0 100 100 meters
                bounds 0 0 1 1 meters
                spacing 1 meters
            }
        "#;
        assert!(parse(src).is_err());
    }
}
