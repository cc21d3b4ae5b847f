use foundation::LonLatBounds;

/// Camera control of the external map.
pub trait Viewport {
    /// Fits `[[min_lon, min_lat], [max_lon, max_lat]]` into view.
    fn fit_bounds(&mut self, corners: [[f64; 2]; 2]);
    fn jump_to(&mut self, center: [f64; 2], zoom: f64);
}

/// The world view shown before any country is selected.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportDefaults {
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for ViewportDefaults {
    fn default() -> Self {
        Self {
            center: [0.0, 20.0],
            zoom: 2.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ViewState {
    Fitted([[f64; 2]; 2]),
    At { center: [f64; 2], zoom: f64 },
}

/// Viewport that only remembers where it was last sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedViewport {
    pub state: ViewState,
    pub moves: usize,
}

impl RecordedViewport {
    pub fn new(defaults: ViewportDefaults) -> Self {
        Self {
            state: ViewState::At {
                center: defaults.center,
                zoom: defaults.zoom,
            },
            moves: 0,
        }
    }

    pub fn fitted_to(&self, bounds: &LonLatBounds) -> bool {
        self.state == ViewState::Fitted(bounds.corners())
    }
}

impl Default for RecordedViewport {
    fn default() -> Self {
        Self::new(ViewportDefaults::default())
    }
}

impl Viewport for RecordedViewport {
    fn fit_bounds(&mut self, corners: [[f64; 2]; 2]) {
        self.state = ViewState::Fitted(corners);
        self.moves += 1;
    }

    fn jump_to(&mut self, center: [f64; 2], zoom: f64) {
        self.state = ViewState::At { center, zoom };
        self.moves += 1;
    }
}
