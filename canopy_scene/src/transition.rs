// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Eased interpolation of auto-size changes.

use kurbo::Size;

/// Easing curve applied to normalized progress.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Easing {
    /// Linear.
    #[default]
    None,
    /// Quadratic ease-in.
    In,
    /// Quadratic ease-out.
    Out,
    /// Quadratic ease-in-out.
    InOut,
}

impl Easing {
    /// Map progress `t` in `0..=1` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::None => t,
            Self::In => t * t,
            Self::Out => t * (2.0 - t),
            Self::InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// An in-flight animation of a composite's auto-size.
///
/// This is the only writer allowed to change the size on an auto-sized axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AutoSizeTransition {
    /// Size at the start.
    pub from: Size,
    /// Size at the end.
    pub to: Size,
    /// Clock time at the start.
    pub start: f64,
    /// Length in clock time.
    pub duration: f64,
    /// Easing curve.
    pub easing: Easing,
}

impl AutoSizeTransition {
    /// Interpolated size at `time`.
    pub fn value_at(&self, time: f64) -> Size {
        if self.is_finished(time) {
            return self.to;
        }
        let t = self.easing.apply((time - self.start) / self.duration);
        Size::new(
            self.from.width + (self.to.width - self.from.width) * t,
            self.from.height + (self.to.height - self.from.height) * t,
        )
    }

    /// Whether the animation has reached its target by `time`.
    ///
    /// Rewinding before the start keeps the transition running at its first frame.
    pub fn is_finished(&self, time: f64) -> bool {
        self.duration <= 0.0 || time >= self.start + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints() {
        for e in [Easing::None, Easing::In, Easing::Out, Easing::InOut] {
            assert_eq!(e.apply(0.0), 0.0, "{e:?} must start at 0");
            assert_eq!(e.apply(1.0), 1.0, "{e:?} must end at 1");
        }
        assert!(Easing::In.apply(0.5) < 0.5);
        assert!(Easing::Out.apply(0.5) > 0.5);
        assert_eq!(Easing::InOut.apply(0.5), 0.5);
    }

    #[test]
    fn transition_interpolates_then_settles() {
        let t = AutoSizeTransition {
            from: Size::new(0.0, 100.0),
            to: Size::new(100.0, 0.0),
            start: 10.0,
            duration: 20.0,
            easing: Easing::None,
        };
        assert_eq!(t.value_at(10.0), Size::new(0.0, 100.0));
        assert_eq!(t.value_at(20.0), Size::new(50.0, 50.0));
        assert!(!t.is_finished(29.0));
        assert_eq!(t.value_at(30.0), Size::new(100.0, 0.0));
        assert!(t.is_finished(30.0));
    }
}
