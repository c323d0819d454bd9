use std::collections::BTreeMap;

use super::keys;
use super::Meta;

pub type Arrangement = BTreeMap<String, Vec<Meta>>;

pub fn create_arrangement(metas: &[Meta], key: &str) -> Arrangement {
    let mut arrangement = Arrangement::new();
    let is_set = keys::key_type(key).is_set();
    for meta in metas {
        let Some(value) = meta.get(key) else {
            continue;
        };
        if is_set {
            for item in meta.get_list(key).unwrap_or_default() {
                arrangement
                    .entry(item.to_string())
                    .or_default()
                    .push(meta.clone());
            }
        } else {
            arrangement
                .entry(value.to_string())
                .or_default()
                .push(meta.clone());
        }
    }
    arrangement
}

pub fn counted(arrangement: &Arrangement) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = arrangement
        .iter()
        .map(|(name, metas)| (name.as_str(), metas.len()))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts
}

#[cfg(test)]
mod tests {
    use super::{counted, create_arrangement};
    use crate::id::Zid;
    use crate::meta::Meta;

    fn meta(zid: u64, tags: &str, role: &str) -> Meta {
        let mut m = Meta::new(Zid::from_u64(zid).expect("zid should be valid"));
        m.set("tags", tags);
        m.set("role", role);
        m
    }

    #[test]
    fn set_keys_group_per_element() {
        let metas = vec![
            meta(1, "#a #b", "zettel"),
            meta(2, "#b", "zettel"),
            meta(3, "#c", "manual"),
        ];
        let by_tag = create_arrangement(&metas, "tags");
        assert_eq!(by_tag.len(), 3);
        assert_eq!(by_tag["#b"].len(), 2);
        assert_eq!(counted(&by_tag)[0], ("#b", 2));

        let by_role = create_arrangement(&metas, "role");
        assert_eq!(by_role["zettel"].len(), 2);
        assert_eq!(by_role["manual"][0].zid.as_u64(), 3);
    }

    #[test]
    fn zettel_without_key_are_skipped() {
        let metas = vec![Meta::new(Zid::from_u64(9).expect("zid should be valid"))];
        assert!(create_arrangement(&metas, "tags").is_empty());
    }
}
