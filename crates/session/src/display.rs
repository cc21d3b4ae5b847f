use engine::RegionCollection;

/// Where the on-demand strategy puts aggregated boundaries.
///
/// At most one collection is displayed at a time; `show` replaces.
pub trait BoundaryDisplay {
    fn show(&mut self, regions: RegionCollection);
    fn clear(&mut self);
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordedDisplay {
    pub current: Option<RegionCollection>,
    pub shows: usize,
}

impl BoundaryDisplay for RecordedDisplay {
    fn show(&mut self, regions: RegionCollection) {
        self.current = Some(regions);
        self.shows += 1;
    }

    fn clear(&mut self) {
        self.current = None;
    }
}
