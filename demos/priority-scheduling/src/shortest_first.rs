use cloudlet_sim::{Cloudlet, DispatchPolicy};

/// Submits the shortest cloudlets first, all at once.
pub struct ShortestFirst;

impl DispatchPolicy for ShortestFirst {
    fn order_pending(&self, mut cloudlets: Vec<Cloudlet>) -> Vec<Cloudlet> {
        cloudlets.sort_by_key(Cloudlet::length);
        cloudlets
    }

    fn name(&self) -> String {
        "shortest-first".to_string()
    }
}
