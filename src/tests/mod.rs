mod test_clustering;
mod test_data;
mod test_laplacian;
mod test_ranking;

use crate::core::ItemId;

pub fn init() {
    crate::init();
}

pub fn id(n: u64) -> ItemId {
    ItemId::from(n)
}

pub fn ids(n: u64) -> Vec<ItemId> {
    (0..n).map(ItemId::from).collect()
}
