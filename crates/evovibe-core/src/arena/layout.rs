//! Arena kinds and the geometry the operator enters for them.

use serde::{Deserialize, Serialize};

use evovibe_media::{ImageSize, RegionOfInterest};

use crate::error::EvovibeResult;
use crate::operator::Operator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArenaKind {
    /// Stadium split by a horizontal border; one CASU above, one below.
    StadiumBorder,
    /// Round arena around a single CASU.
    Circular,
    /// Two separate rectangular boxes, one CASU each.
    TwoBoxes,
}

impl ArenaKind {
    /// Names of the member positions, in member order.
    pub fn member_labels(self) -> &'static [&'static str] {
        match self {
            ArenaKind::StadiumBorder => &["top", "bottom"],
            ArenaKind::Circular => &["center"],
            ArenaKind::TwoBoxes => &["first", "second"],
        }
    }

    pub fn arity(self) -> usize {
        self.member_labels().len()
    }
}

/// Axis-aligned box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl PixelBox {
    fn roi(&self) -> RegionOfInterest {
        RegionOfInterest::Rectangle {
            left: self.left,
            top: self.top,
            right: self.right,
            bottom: self.bottom,
        }
    }
}

/// Persisted geometry of one arena, `arena-N/properties.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArenaLayout {
    StadiumBorder { border: u32, area: PixelBox },
    Circular {
        center_x: u32,
        center_y: u32,
        radius: u32,
    },
    TwoBoxes { first: PixelBox, second: PixelBox },
}

impl ArenaLayout {
    pub fn kind(&self) -> ArenaKind {
        match self {
            ArenaLayout::StadiumBorder { .. } => ArenaKind::StadiumBorder,
            ArenaLayout::Circular { .. } => ArenaKind::Circular,
            ArenaLayout::TwoBoxes { .. } => ArenaKind::TwoBoxes,
        }
    }

    /// One region of interest per member, in member order.
    pub fn regions(&self) -> Vec<RegionOfInterest> {
        match *self {
            ArenaLayout::StadiumBorder { area, border } => vec![
                PixelBox {
                    bottom: border,
                    ..area
                }
                .roi(),
                PixelBox { top: border, ..area }.roi(),
            ],
            ArenaLayout::Circular {
                center_x,
                center_y,
                radius,
            } => vec![RegionOfInterest::Circle {
                center_x,
                center_y,
                radius,
            }],
            ArenaLayout::TwoBoxes { first, second } => vec![first.roi(), second.roi()],
        }
    }

    /// Ask the operator for the geometry of a `kind` arena, re-asking until it is consistent.
    pub async fn ask(
        kind: ArenaKind,
        operator: &dyn Operator,
        size: ImageSize,
    ) -> EvovibeResult<Self> {
        match kind {
            ArenaKind::StadiumBorder => loop {
                let area = ask_box(operator, size, "arena").await?;
                let border = operator
                    .ask_number(
                        "Vertical coordinate of the border?",
                        0,
                        size.height.saturating_sub(1),
                    )
                    .await?;
                if area.top < border && border < area.bottom {
                    return Ok(ArenaLayout::StadiumBorder { area, border });
                }
                operator.notify("Invalid border position!").await;
            },
            ArenaKind::Circular => loop {
                let center_x = operator
                    .ask_number(
                        "Horizontal coordinate of the arena center?",
                        0,
                        size.width.saturating_sub(1),
                    )
                    .await?;
                let center_y = operator
                    .ask_number(
                        "Vertical coordinate of the arena center?",
                        0,
                        size.height.saturating_sub(1),
                    )
                    .await?;
                let radius = operator
                    .ask_number("Radius of the arena?", 1, size.width.max(size.height))
                    .await?;
                let layout = ArenaLayout::Circular {
                    center_x,
                    center_y,
                    radius,
                };
                if layout.regions()[0].validate(size).is_ok() {
                    return Ok(layout);
                }
                operator.notify("Invalid arena position!").await;
            },
            ArenaKind::TwoBoxes => {
                let first = ask_box(operator, size, "first box").await?;
                let second = ask_box(operator, size, "second box").await?;
                Ok(ArenaLayout::TwoBoxes { first, second })
            }
        }
    }
}

async fn ask_box(operator: &dyn Operator, size: ImageSize, what: &str) -> EvovibeResult<PixelBox> {
    let max_x = size.width.saturating_sub(1);
    let max_y = size.height.saturating_sub(1);
    loop {
        let left = operator
            .ask_number(&format!("Leftmost (min) pixel of the {what}?"), 0, max_x)
            .await?;
        let right = operator
            .ask_number(&format!("Rightmost (max) pixel of the {what}?"), 0, max_x)
            .await?;
        if left >= right {
            operator.notify("Invalid pixel data!").await;
            continue;
        }
        let top = operator
            .ask_number(&format!("Topmost (min) pixel of the {what}?"), 0, max_y)
            .await?;
        let bottom = operator
            .ask_number(&format!("Bottommost (max) pixel of the {what}?"), 0, max_y)
            .await?;
        if top >= bottom {
            operator.notify("Invalid pixel data!").await;
            continue;
        }
        return Ok(PixelBox {
            left,
            right,
            top,
            bottom,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedOperator;

    const SIZE: ImageSize = ImageSize {
        width: 600,
        height: 400,
    };

    #[test]
    fn stadium_splits_at_the_border() {
        let layout = ArenaLayout::StadiumBorder {
            area: PixelBox {
                left: 10,
                right: 500,
                top: 20,
                bottom: 300,
            },
            border: 150,
        };
        assert_eq!(
            layout.regions(),
            vec![
                RegionOfInterest::Rectangle {
                    left: 10,
                    top: 20,
                    right: 500,
                    bottom: 150
                },
                RegionOfInterest::Rectangle {
                    left: 10,
                    top: 150,
                    right: 500,
                    bottom: 300
                },
            ]
        );
        assert_eq!(layout.kind().arity(), 2);
    }

    #[tokio::test]
    async fn stadium_border_outside_the_area_is_reasked() {
        let op = ScriptedOperator::new().script([
            "10", "500", "20", "300", "350", // border below the area
            "10", "500", "20", "300", "150",
        ]);
        let layout = ArenaLayout::ask(ArenaKind::StadiumBorder, &op, SIZE)
            .await
            .unwrap();
        assert!(matches!(layout, ArenaLayout::StadiumBorder { border: 150, .. }));
        assert!(op
            .transcript()
            .contains(&"! Invalid border position!".to_string()));
    }

    #[tokio::test]
    async fn inverted_box_is_reasked() {
        let op = ScriptedOperator::new().script([
            "300", "100", // left > right
            "100", "300", "10", "90", "400", "500", "10", "90",
        ]);
        let layout = ArenaLayout::ask(ArenaKind::TwoBoxes, &op, SIZE)
            .await
            .unwrap();
        let ArenaLayout::TwoBoxes { first, second } = layout else {
            panic!("wrong kind");
        };
        assert_eq!((first.left, first.right), (100, 300));
        assert_eq!((second.left, second.bottom), (400, 90));
    }

    #[tokio::test]
    async fn circle_must_fit_the_image() {
        let op = ScriptedOperator::new().script(["300", "200", "250", "300", "200", "150"]);
        let layout = ArenaLayout::ask(ArenaKind::Circular, &op, SIZE)
            .await
            .unwrap();
        assert_eq!(
            layout,
            ArenaLayout::Circular {
                center_x: 300,
                center_y: 200,
                radius: 150
            }
        );
    }

    #[test]
    fn layout_round_trips_through_toml() {
        let layout = ArenaLayout::Circular {
            center_x: 1,
            center_y: 2,
            radius: 1,
        };
        let text = toml::to_string(&layout).unwrap();
        assert!(text.contains("kind = \"circular\""));
        assert_eq!(toml::from_str::<ArenaLayout>(&text).unwrap(), layout);
    }
}
