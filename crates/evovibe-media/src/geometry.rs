//! Image geometry: frame size and per-device regions of interest.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Camera frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `WxH`, as ImageMagick and gstreamer caps expect it.
    pub fn geometry(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Masked image area associated with one device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RegionOfInterest {
    Rectangle {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    Circle {
        center_x: u32,
        center_y: u32,
        radius: u32,
    },
}

impl RegionOfInterest {
    /// Check the region lies inside an image of `size` and is not degenerate.
    pub fn validate(&self, size: ImageSize) -> MediaResult<()> {
        let fail = |reason: String| {
            Err(MediaError::Geometry {
                width: size.width,
                height: size.height,
                reason,
            })
        };
        match *self {
            RegionOfInterest::Rectangle {
                left,
                top,
                right,
                bottom,
            } => {
                if left >= right || top >= bottom {
                    return fail(format!(
                        "rectangle ({left},{top})-({right},{bottom}) is empty"
                    ));
                }
                if right >= size.width || bottom >= size.height {
                    return fail(format!(
                        "rectangle ({left},{top})-({right},{bottom}) exceeds the image"
                    ));
                }
                Ok(())
            }
            RegionOfInterest::Circle {
                center_x,
                center_y,
                radius,
            } => {
                if radius == 0 {
                    return fail("circle has zero radius".to_string());
                }
                if center_x < radius
                    || center_y < radius
                    || center_x + radius >= size.width
                    || center_y + radius >= size.height
                {
                    return fail(format!(
                        "circle at ({center_x},{center_y}) r={radius} exceeds the image"
                    ));
                }
                Ok(())
            }
        }
    }

    /// Pixels inside the region, edges included.
    pub fn area(&self) -> u64 {
        match *self {
            RegionOfInterest::Rectangle {
                left,
                top,
                right,
                bottom,
            } => {
                u64::from(right.saturating_sub(left) + 1) * u64::from(bottom.saturating_sub(top) + 1)
            }
            RegionOfInterest::Circle { radius, .. } => {
                (std::f64::consts::PI * f64::from(radius).powi(2)).round() as u64
            }
        }
    }

    /// ImageMagick `-draw` primitive for this region.
    pub fn draw_primitive(&self) -> String {
        match *self {
            RegionOfInterest::Rectangle {
                left,
                top,
                right,
                bottom,
            } => format!("rectangle {left},{top} {right},{bottom}"),
            RegionOfInterest::Circle {
                center_x,
                center_y,
                radius,
            } => format!(
                "circle {center_x},{center_y} {},{center_y}",
                center_x + radius
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: ImageSize = ImageSize {
        width: 600,
        height: 400,
    };

    #[test]
    fn rectangle_validation() {
        let ok = RegionOfInterest::Rectangle {
            left: 10,
            top: 10,
            right: 200,
            bottom: 150,
        };
        assert!(ok.validate(SIZE).is_ok());

        let inverted = RegionOfInterest::Rectangle {
            left: 200,
            top: 10,
            right: 10,
            bottom: 150,
        };
        assert!(inverted.validate(SIZE).is_err());

        let outside = RegionOfInterest::Rectangle {
            left: 0,
            top: 0,
            right: 600,
            bottom: 10,
        };
        assert!(outside.validate(SIZE).is_err());
    }

    #[test]
    fn circle_validation() {
        let ok = RegionOfInterest::Circle {
            center_x: 300,
            center_y: 200,
            radius: 150,
        };
        assert!(ok.validate(SIZE).is_ok());

        let clipped = RegionOfInterest::Circle {
            center_x: 300,
            center_y: 200,
            radius: 250,
        };
        assert!(clipped.validate(SIZE).is_err());
    }

    #[test]
    fn region_areas() {
        let rect = RegionOfInterest::Rectangle {
            left: 10,
            top: 20,
            right: 19,
            bottom: 24,
        };
        assert_eq!(rect.area(), 50);
        let circle = RegionOfInterest::Circle {
            center_x: 300,
            center_y: 200,
            radius: 100,
        };
        assert_eq!(circle.area(), 31_416);
    }

    #[test]
    fn draw_primitives() {
        let rect = RegionOfInterest::Rectangle {
            left: 1,
            top: 2,
            right: 3,
            bottom: 4,
        };
        assert_eq!(rect.draw_primitive(), "rectangle 1,2 3,4");
        let circle = RegionOfInterest::Circle {
            center_x: 50,
            center_y: 60,
            radius: 10,
        };
        assert_eq!(circle.draw_primitive(), "circle 50,60 60,60");
        assert_eq!(SIZE.geometry(), "600x400");
    }
}
