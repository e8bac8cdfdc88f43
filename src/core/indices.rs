use hashbrown::{HashMap, HashSet};

use crate::types::RecordId;

/// Secondary index from a key to record ids in insertion order.
pub type VecIndex<K> = HashMap<K, Vec<RecordId>>;

pub(crate) fn remove_from_vec_index<K>(index: &mut VecIndex<K>, key: &K, id: RecordId)
where
    K: std::hash::Hash + Eq,
{
    let now_empty = match index.get_mut(key) {
        Some(ids) => {
            if let Some(pos) = ids.iter().position(|x| *x == id) {
                ids.remove(pos);
            }
            ids.is_empty()
        }
        None => false,
    };
    if now_empty {
        index.remove(key);
    }
}

/// Moves `id` under `key` to sit right after the ids in `before`.
///
/// Each index list is a subsequence of the ledger order, so the ids that
/// precede `id` there form a prefix of the list.
pub(crate) fn reposition_in_vec_index<K>(
    index: &mut VecIndex<K>,
    key: &K,
    id: RecordId,
    before: &HashSet<RecordId>,
) where
    K: std::hash::Hash + Eq,
{
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|x| *x != id);
        let at = ids.iter().take_while(|x| before.contains(*x)).count();
        ids.insert(at, id);
    }
}
