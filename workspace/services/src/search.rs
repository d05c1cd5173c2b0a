use sea_orm::ColumnTrait;
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};

const LIKE_ESCAPE: char = '\\';

/// Case-insensitive substring match that behaves the same on SQLite and PostgreSQL.
/// `%`, `_` and `\` in the term match literally.
pub(crate) fn icontains<C: ColumnTrait>(column: C, term: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    Expr::expr(Func::lower(Expr::col(column.as_column_ref())))
        .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
