//! 宏工具函数

use syn::{spanned::Spanned, Error, Expr, ExprArray, Lit, LitBool, LitStr, Result};

/// 读取字符串字面量
pub fn expect_str(expr: &Expr, key: &str) -> Result<LitStr> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Ok(lit_str.clone()),
            other => Err(Error::new(other.span(), format!("`{}` 需要字符串字面量", key))),
        },
        other => Err(Error::new(other.span(), format!("`{}` 需要字符串字面量", key))),
    }
}

/// 读取整数字面量
pub fn expect_u64(expr: &Expr, key: &str) -> Result<u64> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Int(lit_int) => lit_int.base10_parse(),
            other => Err(Error::new(other.span(), format!("`{}` 需要整数字面量", key))),
        },
        other => Err(Error::new(other.span(), format!("`{}` 需要整数字面量", key))),
    }
}

/// 读取布尔字面量
pub fn expect_bool(expr: &Expr, key: &str) -> Result<bool> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Bool(LitBool { value, .. }) => Ok(*value),
            other => Err(Error::new(other.span(), format!("`{}` 需要 true 或 false", key))),
        },
        other => Err(Error::new(other.span(), format!("`{}` 需要 true 或 false", key))),
    }
}

/// 读取字符串数组，例如 `["a", "b"]`；单个字符串视为只有一个元素的数组
pub fn expect_str_list(expr: &Expr, key: &str) -> Result<Vec<LitStr>> {
    match expr {
        Expr::Array(ExprArray { elems, .. }) => elems
            .iter()
            .map(|elem| expect_str(elem, key))
            .collect(),
        Expr::Lit(_) => Ok(vec![expect_str(expr, key)?]),
        other => Err(Error::new(
            other.span(),
            format!("`{}` 需要字符串数组，例如 [\"topic\"]", key),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_list_accepts_array_and_single_string() {
        let expr: Expr = syn::parse_quote!(["a", "b"]);
        let values: Vec<String> = expect_str_list(&expr, "topics")
            .unwrap()
            .iter()
            .map(LitStr::value)
            .collect();
        assert_eq!(values, vec!["a", "b"]);

        let expr: Expr = syn::parse_quote!("single");
        assert_eq!(expect_str_list(&expr, "topics").unwrap().len(), 1);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let expr: Expr = syn::parse_quote!(42);
        assert!(expect_str(&expr, "group_id").is_err());
        assert_eq!(expect_u64(&expr, "session_timeout_ms").unwrap(), 42);

        let expr: Expr = syn::parse_quote!(true);
        assert!(expect_bool(&expr, "from_beginning").unwrap());
        assert!(expect_u64(&expr, "session_timeout_ms").is_err());
    }
}
