//! Merging list definitions across documents

use std::collections::{BTreeMap, HashMap};

use super::{AbstractNum, Num, Numbering};

fn same_list(a: &Numbering, a_id: u32, b: &Numbering, b_id: u32) -> bool {
    let (Some(a_num), Some(b_num)) = (a.nums.get(&a_id), b.nums.get(&b_id)) else {
        return false;
    };
    match (a.abstract_for(a_id), b.abstract_for(b_id)) {
        (Some(a_abs), Some(b_abs)) => {
            a_abs.same_definition(b_abs) && a_num.level_overrides == b_num.level_overrides
        }
        _ => false,
    }
}

/// Bring the list definitions of `source` into `dest`.
///
/// Returns the source numId to destination numId map. With
/// `keep_source_numbering` every incoming list is copied under fresh ids;
/// otherwise an incoming list reuses the first structurally equal
/// destination list and only unmatched lists are copied.
pub fn import_lists(
    dest: &mut Numbering,
    source: &Numbering,
    keep_source_numbering: bool,
) -> HashMap<u32, u32> {
    let mut map = HashMap::new();
    let mut copied_abstracts: BTreeMap<u32, u32> = BTreeMap::new();

    for (&src_id, src_num) in &source.nums {
        if !keep_source_numbering {
            let existing = dest
                .nums
                .keys()
                .copied()
                .find(|&dest_id| same_list(source, src_id, dest, dest_id));
            if let Some(dest_id) = existing {
                map.insert(src_id, dest_id);
                continue;
            }
        }

        let abs_id = match copied_abstracts.get(&src_num.abstract_num_id) {
            Some(&id) => id,
            None => {
                let abs = source
                    .abstract_for(src_id)
                    .cloned()
                    .unwrap_or_else(|| AbstractNum::new(0));
                let id = copy_abstract(dest, abs);
                copied_abstracts.insert(src_num.abstract_num_id, id);
                id
            }
        };

        let mut num = Num::new(0, abs_id);
        num.level_overrides = src_num.level_overrides.clone();
        let dest_id = dest.add_num(num);
        log::debug!("list {} imported as {}", src_id, dest_id);
        map.insert(src_id, dest_id);
    }

    map
}

/// Insert under a fresh abstract id; a clashing style link is dropped so
/// the destination's list style keeps resolving to its own definition
fn copy_abstract(dest: &mut Numbering, mut abs: AbstractNum) -> u32 {
    let id = dest
        .abstract_nums
        .keys()
        .next_back()
        .map(|id| id + 1)
        .unwrap_or(0);
    abs.abstract_num_id = id;
    if let Some(link) = &abs.style_link {
        if dest
            .abstract_nums
            .values()
            .any(|a| a.style_link.as_deref() == Some(link.as_str()))
        {
            abs.style_link = None;
        }
    }
    // Levels are copied inline; the list no longer depends on a style link
    abs.num_style_link = None;
    dest.abstract_nums.insert(id, abs);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matching_lists_are_reused() {
        let mut dest = Numbering::new();
        let dest_decimal = dest.add_decimal_list();
        let mut source = Numbering::new();
        let src_bullets = source.add_bullet_list();
        let src_decimal = source.add_decimal_list();

        let map = import_lists(&mut dest, &source, false);

        assert_eq!(map[&src_decimal], dest_decimal);
        assert_ne!(map[&src_bullets], dest_decimal);
        assert!(dest.is_bullet_list(map[&src_bullets]));
        assert_eq!(dest.nums.len(), 2);
    }

    #[test]
    fn test_keep_source_numbering_copies_everything() {
        let mut dest = Numbering::new();
        dest.add_decimal_list();
        let mut source = Numbering::new();
        let src_decimal = source.add_decimal_list();

        let map = import_lists(&mut dest, &source, true);

        assert_eq!(map[&src_decimal], 2);
        assert_eq!(dest.nums.len(), 2);
        assert_eq!(dest.abstract_nums.len(), 2);
        assert_eq!(dest.get_level_text(2, 0), Some("%0."));
    }

    #[test]
    fn test_instances_share_copied_abstract() {
        let mut source = Numbering::new();
        let first = source.add_decimal_list();
        let second = source.restart_list(first).unwrap();
        let mut dest = Numbering::new();

        let map = import_lists(&mut dest, &source, true);

        assert_eq!(dest.abstract_nums.len(), 1);
        assert_eq!(
            dest.nums[&map[&first]].abstract_num_id,
            dest.nums[&map[&second]].abstract_num_id
        );
    }
}
