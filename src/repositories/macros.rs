//! Macro for inline equality criteria.

/// Builds a [`Criteria`](crate::repositories::Criteria) mapping columns to
/// the values they must equal.
///
/// # Usage
///
/// ```ignore
/// use tablemap::criteria;
///
/// // Every row
/// let all = criteria!{};
///
/// // WHERE "id_user" = $1 AND "status" = $2
/// let rows = repository
///     .find_some(criteria!{ "id_user" => 1, "status" => 0 }, None)
///     .await?;
/// ```
#[macro_export]
macro_rules! criteria {
    () => {
        $crate::repositories::Criteria::None
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::repositories::Criteria::Values(vec![
            $($crate::repositories::Criteria::pair($column, $value)),+
        ])
    };
}
