use serde_json::{json, Map, Value};

use crate::geo::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermType {
    MakeArray = 2,
    Var = 10,
    Db = 14,
    Table = 15,
    Eq = 17,
    GetField = 31,
    Filter = 39,
    Count = 43,
    Insert = 56,
    TableCreate = 60,
    TableDrop = 61,
    TableList = 62,
    Func = 69,
    IndexCreate = 75,
    IndexList = 77,
    IndexWait = 140,
    Point = 159,
    GetNearest = 168,
    Wait = 177,
}

/// A ReQL expression in its JSON wire form, `[type, [args...], {optargs}]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Term(Value);

impl Term {
    fn new(kind: TermType, args: Vec<Term>) -> Self {
        let args: Vec<Value> = args.into_iter().map(Term::into_json).collect();
        Term(json!([kind as u32, args]))
    }

    fn with_optargs(kind: TermType, args: Vec<Term>, optargs: Map<String, Value>) -> Self {
        let args: Vec<Value> = args.into_iter().map(Term::into_json).collect();
        Term(json!([kind as u32, args, optargs]))
    }

    /// Lifts a plain JSON value into a term. Arrays become `MAKE_ARRAY`
    /// and geometry points become `point(lon, lat)`, since a bare JSON array
    /// would otherwise be read as a term.
    pub fn datum(value: Value) -> Self {
        match value {
            Value::Array(items) => Term::new(
                TermType::MakeArray,
                items.into_iter().map(Term::datum).collect(),
            ),
            Value::Object(object) => {
                if object.contains_key("$reql_type$") {
                    if let Ok(point) = serde_json::from_value::<Point>(Value::Object(object.clone()))
                    {
                        return Term::point(point);
                    }
                }
                Term(Value::Object(
                    object
                        .into_iter()
                        .map(|(key, value)| (key, Term::datum(value).into_json()))
                        .collect(),
                ))
            }
            scalar => Term(scalar),
        }
    }

    pub fn db(name: &str) -> Self {
        Term::new(TermType::Db, vec![Term::datum(name.into())])
    }

    pub fn point(point: Point) -> Self {
        Term::new(
            TermType::Point,
            vec![Term::datum(point.lon.into()), Term::datum(point.lat.into())],
        )
    }

    pub fn var(id: u64) -> Self {
        Term::new(TermType::Var, vec![Term::datum(id.into())])
    }

    /// A one-argument function; the body refers to its argument as `var(1)`.
    pub fn func1(body: Term) -> Self {
        Term::new(
            TermType::Func,
            vec![Term::new(TermType::MakeArray, vec![Term::datum(1.into())]), body],
        )
    }

    pub fn table(&self, name: &str) -> Self {
        Term::new(TermType::Table, vec![self.clone(), Term::datum(name.into())])
    }

    pub fn table_create(&self, name: &str) -> Self {
        Term::new(
            TermType::TableCreate,
            vec![self.clone(), Term::datum(name.into())],
        )
    }

    pub fn table_drop(&self, name: &str) -> Self {
        Term::new(TermType::TableDrop, vec![self.clone(), Term::datum(name.into())])
    }

    pub fn table_list(&self) -> Self {
        Term::new(TermType::TableList, vec![self.clone()])
    }

    pub fn index_create(&self, name: &str, geo: bool) -> Self {
        let mut optargs = Map::new();
        if geo {
            optargs.insert("geo".to_string(), Value::Bool(true));
        }
        Term::with_optargs(
            TermType::IndexCreate,
            vec![self.clone(), Term::datum(name.into())],
            optargs,
        )
    }

    pub fn index_list(&self) -> Self {
        Term::new(TermType::IndexList, vec![self.clone()])
    }

    pub fn index_wait(&self, name: &str) -> Self {
        Term::new(TermType::IndexWait, vec![self.clone(), Term::datum(name.into())])
    }

    pub fn wait(&self) -> Self {
        Term::new(TermType::Wait, vec![self.clone()])
    }

    pub fn insert(&self, document: Term) -> Self {
        Term::new(TermType::Insert, vec![self.clone(), document])
    }

    pub fn count(&self) -> Self {
        Term::new(TermType::Count, vec![self.clone()])
    }

    pub fn get_nearest(&self, center: Point, optargs: Map<String, Value>) -> Self {
        Term::with_optargs(
            TermType::GetNearest,
            vec![self.clone(), Term::point(center)],
            optargs,
        )
    }

    /// On a sequence this plucks the field out of every element.
    pub fn get_field(&self, field: &str) -> Self {
        Term::new(TermType::GetField, vec![self.clone(), Term::datum(field.into())])
    }

    pub fn eq(&self, other: Term) -> Self {
        Term::new(TermType::Eq, vec![self.clone(), other])
    }

    pub fn filter(&self, predicate: Term) -> Self {
        Term::new(TermType::Filter, vec![self.clone(), predicate])
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_term() {
        let term = Term::db("test").table("geospatial");
        assert_eq!(term.as_json(), &json!([15, [[14, ["test"]], "geospatial"]]));
    }

    #[test]
    fn test_index_create_carries_geo_optarg() {
        let term = Term::db("test").table("geospatial").index_create("area", true);
        assert_eq!(
            term.as_json(),
            &json!([75, [[15, [[14, ["test"]], "geospatial"]], "area"], {"geo": true}])
        );
    }

    #[test]
    fn test_datum_wraps_arrays() {
        let term = Term::datum(json!({"tags": ["a", "b"], "n": 1}));
        assert_eq!(term.as_json(), &json!({"tags": [2, ["a", "b"]], "n": 1}));
    }

    #[test]
    fn test_datum_turns_geometry_into_point_term() {
        let document = json!({
            "name": "first",
            "area": {
                "$reql_type$": "GEOMETRY",
                "coordinates": [-122.423246, 37.77929790366427],
                "type": "Point"
            }
        });
        let term = Term::datum(document);
        assert_eq!(
            term.as_json(),
            &json!({"name": "first", "area": [159, [-122.423246, 37.77929790366427]]})
        );
    }

    #[test]
    fn test_filter_on_field_equality() {
        let predicate = Term::func1(Term::var(1).get_field("name").eq(Term::datum("first".into())));
        assert_eq!(
            predicate.as_json(),
            &json!([69, [[2, [1]], [17, [[31, [[10, [1]], "name"]], "first"]]]])
        );
    }
}
