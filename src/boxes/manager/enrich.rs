use crate::id::Zid;
use crate::meta::keys;
use crate::meta::values;
use crate::meta::Meta;

pub(super) fn enrich_stored(meta: &mut Meta, box_number: usize) {
    if !meta.has(keys::KEY_CREATED) {
        meta.set(keys::KEY_CREATED, &compute_created(meta.zid));
        meta.set(keys::KEY_CREATED_MISSING, "true");
    }
    if box_number > 0 {
        meta.set(keys::KEY_BOX_NUMBER, &box_number.to_string());
    }
}

pub(super) fn compute_published(meta: &mut Meta) {
    if meta.has(keys::KEY_PUBLISHED) {
        return;
    }
    for key in [keys::KEY_MODIFIED, keys::KEY_CREATED] {
        if let Some(value) = meta.get(key) {
            if values::timestamp_value(value).is_some() {
                let value = value.to_string();
                meta.set(keys::KEY_PUBLISHED, &value);
                return;
            }
        }
    }
    let zid = meta.zid.to_string();
    if values::timestamp_value(&zid).is_some() {
        meta.set(keys::KEY_PUBLISHED, &zid);
    }
}

pub(super) fn compute_created(zid: Zid) -> String {
    if zid.as_u64() <= 10_101_000_000 {
        return "00010101000000".to_string();
    }
    let [year, month, day, hour, minute, second] = zid.fields();
    let (month, day) = sanitize_month_day(year, month, day);
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        year,
        month,
        day,
        hour.min(23),
        minute.min(59),
        second.min(59)
    )
}

fn sanitize_month_day(year: u64, month: u64, day: u64) -> (u64, u64) {
    let month = month.clamp(1, 12);
    let max_day = match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    };
    (month, day.clamp(1, max_day))
}

fn is_leap_year(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}
