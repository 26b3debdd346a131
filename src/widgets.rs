//! On-screen controls of the render window, positioned in normalized
//! viewport coordinates (0..1, origin bottom-left).

/// Horizontal slider bound to a scalar range.
#[derive(Clone, Debug, PartialEq)]
pub struct SliderRepresentation {
    minimum: f32,
    maximum: f32,
    value: f32,
    pub title: String,
    pub point1: (f32, f32),
    pub point2: (f32, f32),
    pub slider_length: f32,
    pub slider_width: f32,
    pub tube_width: f32,
    pub animate: bool,
}

impl SliderRepresentation {
    pub fn new(minimum: f32, maximum: f32, value: f32) -> Self {
        let (minimum, maximum) = if minimum <= maximum {
            (minimum, maximum)
        } else {
            (maximum, minimum)
        };
        let mut slider = Self {
            minimum,
            maximum,
            value: minimum,
            title: String::new(),
            point1: (0.0, 0.0),
            point2: (1.0, 0.0),
            slider_length: 0.05,
            slider_width: 0.03,
            tube_width: 0.005,
            animate: false,
        };
        slider.set_value(value);
        slider
    }

    /// The "Opacity1" slider along the bottom of the window.
    pub fn opacity(initial: f32) -> Self {
        Self {
            title: "Opacity1".to_string(),
            point1: (0.2, 0.05),
            point2: (0.8, 0.05),
            animate: true,
            ..Self::new(0.0, 1.0, initial)
        }
    }

    pub fn minimum(&self) -> f32 {
        self.minimum
    }

    pub fn maximum(&self) -> f32 {
        self.maximum
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Clamps into the slider range; non-finite input is ignored.
    pub fn set_value(&mut self, value: f32) {
        if value.is_finite() {
            self.value = value.clamp(self.minimum, self.maximum);
        }
    }
}

/// Fixed text drawn over the render.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub font_family: String,
    pub font_size: u32,
    pub color: [f32; 3],
    pub position: (f32, f32),
}

impl TextLabel {
    pub fn instructions() -> Self {
        Self {
            text: "Use slider to adjust opacity".to_string(),
            font_family: "Arial".to_string(),
            font_size: 18,
            color: [1.0, 1.0, 1.0],
            position: (0.02, 0.95),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_slider_layout() {
        let slider = SliderRepresentation::opacity(0.0);
        assert_eq!(slider.title, "Opacity1");
        assert_eq!((slider.minimum(), slider.maximum()), (0.0, 1.0));
        assert_eq!(slider.point1, (0.2, 0.05));
        assert_eq!(slider.point2, (0.8, 0.05));
        assert_eq!(slider.slider_length, 0.05);
        assert!(slider.animate);
    }

    #[test]
    fn value_is_clamped() {
        let mut slider = SliderRepresentation::opacity(0.5);
        slider.set_value(2.0);
        assert_eq!(slider.value(), 1.0);
        slider.set_value(-1.0);
        assert_eq!(slider.value(), 0.0);
        slider.set_value(f32::NAN);
        assert_eq!(slider.value(), 0.0);
    }

    #[test]
    fn instruction_label() {
        let label = TextLabel::instructions();
        assert_eq!(label.text, "Use slider to adjust opacity");
        assert_eq!(label.font_size, 18);
        assert_eq!(label.position, (0.02, 0.95));
    }
}
