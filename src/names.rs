/// Returns the last segment of a function path, ignoring generic arguments
/// and `<Type as Trait>` qualification.
///
/// Closure segments are not useful on their own, so they keep the segment
/// they are nested in: `app::load::{{closure}}` becomes `load::{{closure}}`.
pub(crate) fn base_name(path: &str) -> &str {
    let mut segment_start = 0usize;
    let mut segment_end = 0usize;
    let mut previous_start = 0usize;
    let mut angle_nesting_level = 0u64;
    let mut curly_nesting_level = 0u64;
    let mut potential_function_arrow = false;
    let mut inside_segment = false;

    for (i, c) in path.char_indices() {
        if curly_nesting_level == 0 && angle_nesting_level == 0 {
            if !inside_segment && unicode_ident::is_xid_start(c) {
                previous_start = segment_start;
                segment_start = i;
                inside_segment = true;
            } else if inside_segment && !unicode_ident::is_xid_continue(c) {
                segment_end = i;
                inside_segment = false;
            }
        }

        let was_potential_function_arrow = potential_function_arrow;
        potential_function_arrow = c == '-';

        if c == '<' {
            angle_nesting_level = angle_nesting_level.saturating_add(1);
        } else if c == '>' && !was_potential_function_arrow {
            angle_nesting_level = angle_nesting_level.saturating_sub(1);
        } else if c == '{' {
            curly_nesting_level = curly_nesting_level.saturating_add(1);
            if !inside_segment && curly_nesting_level == 1 && angle_nesting_level == 0 {
                previous_start = segment_start;
                segment_start = i;
                inside_segment = true;
            }
        } else if c == '}' {
            curly_nesting_level = curly_nesting_level.saturating_sub(1);
            if inside_segment && curly_nesting_level == 0 {
                segment_end = i + 1;
                inside_segment = false;
            }
        }
    }

    let start = if path[segment_start..].starts_with('{') && previous_start < segment_start {
        previous_start
    } else {
        segment_start
    };

    if segment_start < segment_end {
        &path[start..segment_end]
    } else {
        // The last segment runs to the end of the string.
        &path[start..]
    }
}
