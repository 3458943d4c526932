//! Integration tests for the criteria compiler.

use docorm_core::catalog::{AssociationDef, Catalog, EntityDef, PropertyDef, ScalarType};
use docorm_proto::{OrderSpec, Pagination, Value};
use docorm_query::{
    compile, Assignment, BindingParameter, ComparisonOp, CompileErrorKind, Criterion,
    Projection, QueryBuilder, QueryModel,
};
use pretty_assertions::assert_eq;

struct TestContext {
    catalog: Catalog,
}

impl TestContext {
    fn new() -> Self {
        Self {
            catalog: setup_library_catalog(),
        }
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.catalog)
    }

    fn query(&self, entity: &str, criterion: Criterion) -> String {
        compile(&self.catalog, entity, criterion).unwrap().query
    }

    fn error(&self, entity: &str, criterion: Criterion) -> docorm_query::CompileError {
        compile(&self.catalog, entity, criterion).unwrap_err()
    }
}

fn setup_library_catalog() -> Catalog {
    let book = EntityDef::new("Book", "id")
        .with_version("version")
        .with_scalar("id", ScalarType::Int64)
        .with_property(
            PropertyDef::scalar("title", ScalarType::String).with_persisted_name("book_title"),
        )
        .with_scalar("pages", ScalarType::Int32)
        .with_scalar("rating", ScalarType::Int32)
        .with_scalar("published", ScalarType::Bool)
        .with_scalar("version", ScalarType::Int64)
        .with_association("author", AssociationDef::many_to_one("Author"))
        .with_association("meta", AssociationDef::embedded("Meta"))
        .with_association("tags", AssociationDef::many_to_many("Tag"))
        .with_association("chapters", AssociationDef::one_to_many("Chapter"));

    let author = EntityDef::new("Author", "id")
        .with_scalar("id", ScalarType::Int64)
        .with_scalar("name", ScalarType::String)
        .with_association("publisher", AssociationDef::many_to_one("Publisher"))
        .with_association(
            "books",
            AssociationDef::one_to_many("Book").with_mapped_by("author"),
        );

    let publisher = EntityDef::new("Publisher", "id")
        .with_scalar("id", ScalarType::Int64)
        .with_scalar("name", ScalarType::String);

    let meta = EntityDef::embeddable("Meta")
        .with_scalar("isbn", ScalarType::String)
        .with_scalar("edition", ScalarType::Int32);

    let tag = EntityDef::new("Tag", "code")
        .with_scalar("code", ScalarType::String)
        .with_scalar("label", ScalarType::String);

    let chapter = EntityDef::new("Chapter", "id")
        .with_scalar("id", ScalarType::Int64)
        .with_scalar("num", ScalarType::Int32);

    let printing_key = EntityDef::embeddable("PrintingKey")
        .with_scalar("isbn", ScalarType::String)
        .with_scalar("run", ScalarType::Int32);

    let printing = EntityDef::new("Printing", "key")
        .with_assigned_identity()
        .with_association("key", AssociationDef::embedded("PrintingKey"))
        .with_scalar("copies", ScalarType::Int64);

    let review = EntityDef::new("Review", "id")
        .with_scalar("id", ScalarType::Int64)
        .with_association("printing", AssociationDef::many_to_one("Printing"));

    Catalog::new()
        .with_entity(book)
        .with_entity(author)
        .with_entity(publisher)
        .with_entity(meta)
        .with_entity(tag)
        .with_entity(chapter)
        .with_entity(printing_key)
        .with_entity(printing)
        .with_entity(review)
}

// ============================================================================
// Predicates
// ============================================================================

#[test]
fn test_literal_forms() {
    let ctx = TestContext::new();
    let query = ctx.query(
        "Book",
        Criterion::and(vec![
            Criterion::eq("title", "Dune"),
            Criterion::eq("pages", 412i64),
            Criterion::eq("published", true),
            Criterion::eq("rating", Value::Null),
        ]),
    );
    assert_eq!(
        query,
        "{$and:[{book_title:{$eq:'Dune'}},{pages:{$eq:412}},{published:{$eq:true}},{rating:{$eq:null}}]}"
    );
}

#[test]
fn test_operators() {
    let ctx = TestContext::new();
    let query = ctx.query(
        "Book",
        Criterion::or(vec![
            Criterion::ne("pages", 1i64),
            Criterion::gt("pages", 2i64),
            Criterion::gte("pages", 3i64),
            Criterion::lt("pages", 4i64),
            Criterion::lte("pages", 5i64),
        ]),
    );
    assert_eq!(
        query,
        "{$or:[{pages:{$ne:1}},{pages:{$gt:2}},{pages:{$gte:3}},{pages:{$lt:4}},{pages:{$lte:5}}]}"
    );
}

#[test]
fn test_single_child_junction_elides() {
    let ctx = TestContext::new();
    let query = ctx.query(
        "Book",
        Criterion::or(vec![Criterion::and(vec![Criterion::eq("pages", 1i64)])]),
    );
    assert_eq!(query, "{pages:{$eq:1}}");
}

#[test]
fn test_empty_junction_is_empty_document() {
    let ctx = TestContext::new();
    assert_eq!(ctx.query("Book", Criterion::and(vec![])), "{}");
}

#[test]
fn test_negation() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query("Book", Criterion::not(vec![Criterion::eq("title", "X")])),
        "{$not:{book_title:{$eq:'X'}}}"
    );
    assert_eq!(
        ctx.query(
            "Book",
            Criterion::not(vec![Criterion::eq("title", "X"), Criterion::lt("pages", 10i64)])
        ),
        "{$not:{$or:[{book_title:{$eq:'X'}},{pages:{$lt:10}}]}}"
    );
}

#[test]
fn test_null_and_boolean_rewrites() {
    let ctx = TestContext::new();
    let query = ctx.query(
        "Book",
        Criterion::and(vec![
            Criterion::IsNull {
                property: "title".into(),
            },
            Criterion::IsNotNull {
                property: "pages".into(),
            },
            Criterion::IsTrue {
                property: "published".into(),
            },
        ]),
    );
    assert_eq!(
        query,
        "{$and:[{book_title:{$eq:null}},{pages:{$ne:null}},{published:{$eq:true}}]}"
    );
}

#[test]
fn test_id_and_version_rewrites() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query("Book", Criterion::IdEquals(7i64.into())),
        "{'_id':{$eq:7}}"
    );
    assert_eq!(
        ctx.query("Book", Criterion::VersionEquals(3i64.into())),
        "{version:{$eq:3}}"
    );

    let err = ctx.error("Author", Criterion::VersionEquals(3i64.into()));
    assert_eq!(err.kind, CompileErrorKind::IllegalState);
}

#[test]
fn test_between() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query("Book", Criterion::between("pages", 100i64, 200i64)),
        "{$and:[{pages:{$gte:100}},{pages:{$lte:200}}]}"
    );
}

#[test]
fn test_regex() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query(
            "Book",
            Criterion::Regex {
                property: "title".into(),
                value: "^Du".into(),
            }
        ),
        "{book_title:{$regex:'^Du'}}"
    );
}

#[test]
fn test_membership() {
    let ctx = TestContext::new();

    let compiled = compile(
        &ctx.catalog,
        "Book",
        Criterion::is_in("title", BindingParameter::argument(0)),
    )
    .unwrap();
    assert_eq!(compiled.query, "{book_title:{$in:{$qpidx:0}}}");
    assert_eq!(compiled.bindings.len(), 1);
    assert!(compiled.bindings[0].expandable);

    assert_eq!(
        ctx.query("Book", Criterion::is_in("pages", Value::Int64Array(vec![1, 2]))),
        "{pages:{$in:[1,2]}}"
    );
    assert_eq!(
        ctx.query(
            "Book",
            Criterion::NotIn {
                property: "title".into(),
                value: "X".into(),
            }
        ),
        "{book_title:{$nin:['X']}}"
    );
}

#[test]
fn test_is_empty() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query(
            "Book",
            Criterion::IsEmpty {
                property: "title".into()
            }
        ),
        "{$or:[{book_title:{$eq:''}},{book_title:{$exists:false}}]}"
    );
    assert_eq!(
        ctx.query(
            "Book",
            Criterion::IsNotEmpty {
                property: "title".into()
            }
        ),
        "{$and:[{book_title:{$ne:''}},{book_title:{$exists:true}}]}"
    );
}

#[test]
fn test_property_comparison() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query(
            "Book",
            Criterion::compare(ComparisonOp::GreaterThan, "pages", "rating")
        ),
        "{$expr:{$gt:['$pages','$rating']}}"
    );

    let err = ctx.error(
        "Book",
        Criterion::compare(ComparisonOp::Equals, "pages", "words"),
    );
    assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
    assert_eq!(
        err.message,
        "Cannot use [EqualsProperty] criterion on non-existent property path: words"
    );
}

#[test]
fn test_unsupported_variants() {
    let ctx = TestContext::new();
    let err = ctx.error(
        "Book",
        Criterion::Like {
            property: "title".into(),
            value: "Du%".into(),
        },
    );
    assert_eq!(err.kind, CompileErrorKind::UnsupportedOperation);
    assert_eq!(
        err.message,
        "Queries of type Like are not supported by this implementation"
    );

    let err = ctx.error(
        "Book",
        Criterion::SizeEquals {
            property: "tags".into(),
            value: 2i64.into(),
        },
    );
    assert_eq!(err.kind, CompileErrorKind::UnsupportedOperation);
    assert!(err.message.contains("SizeEquals"));
}

// ============================================================================
// Property paths
// ============================================================================

#[test]
fn test_unknown_property() {
    let ctx = TestContext::new();
    let err = ctx.error("Book", Criterion::eq("subtitle", "x"));
    assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
    assert_eq!(
        err.message,
        "Cannot use [Equals] criterion on non-existent property path: subtitle"
    );
}

#[test]
fn test_id_falls_back_to_identity() {
    let ctx = TestContext::new();
    assert_eq!(ctx.query("Tag", Criterion::eq("id", "sf")), "{'_id':{$eq:'sf'}}");
    assert_eq!(
        ctx.query("Tag", Criterion::IdEquals("sf".into())),
        "{'_id':{$eq:'sf'}}"
    );
}

#[test]
fn test_association_identity_needs_no_join() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query("Book", Criterion::eq("author.id", 5i64)),
        "{'author._id':{$eq:5}}"
    );

    let compiled = compile(
        &ctx.catalog,
        "Book",
        Criterion::eq("author", BindingParameter::argument(0)),
    )
    .unwrap();
    assert_eq!(compiled.query, "{'author._id':{$eq:{$qpidx:0}}}");
    assert_eq!(
        compiled.bindings[0].outgoing_path,
        Some(vec!["author".to_string(), "id".to_string()])
    );
}

#[test]
fn test_embedded_expands_to_leaves() {
    let ctx = TestContext::new();
    let compiled = compile(
        &ctx.catalog,
        "Book",
        Criterion::eq("meta", BindingParameter::argument(0)),
    )
    .unwrap();

    assert_eq!(
        compiled.query,
        "{'meta.isbn':{$eq:{$qpidx:0}},'meta.edition':{$eq:{$qpidx:1}}}"
    );
    assert_eq!(compiled.bindings.len(), 2);
    for binding in &compiled.bindings {
        assert_eq!(binding.source.argument_index, Some(0));
        assert_eq!(binding.property_path, Some(vec!["meta".to_string()]));
    }
    assert_eq!(
        compiled.bindings[0].outgoing_path,
        Some(vec!["meta".to_string(), "isbn".to_string()])
    );
    assert_eq!(
        compiled.bindings[1].outgoing_path,
        Some(vec!["meta".to_string(), "edition".to_string()])
    );

    let err = ctx.error("Book", Criterion::eq("meta", "x"));
    assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
}

#[test]
fn test_embedded_leaf_is_plain_path() {
    let ctx = TestContext::new();
    assert_eq!(
        ctx.query("Book", Criterion::eq("meta.edition", 2i64)),
        "{'meta.edition':{$eq:2}}"
    );
}

#[test]
fn test_foreign_key_association_cannot_be_compared() {
    let ctx = TestContext::new();
    let err = ctx.error(
        "Book",
        Criterion::eq("chapters", BindingParameter::argument(0)),
    );
    assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
    assert_eq!(err.message, "Cannot compare foreign key association: Book.chapters");
}

#[test]
fn test_association_property_requires_join() {
    let ctx = TestContext::new();
    let err = ctx.error("Book", Criterion::eq("author.name", "Le Guin"));
    assert_eq!(err.message, "Property is not joined at path: author");
}

#[test]
fn test_join_on_longer_name_does_not_cover_prefix() {
    let catalog = Catalog::new()
        .with_entity(
            EntityDef::new("Book", "id")
                .with_scalar("id", ScalarType::Int64)
                .with_association("author", AssociationDef::many_to_one("Author"))
                .with_association("authorAgent", AssociationDef::many_to_one("Agent")),
        )
        .with_entity(
            EntityDef::new("Author", "id")
                .with_scalar("id", ScalarType::Int64)
                .with_scalar("name", ScalarType::String),
        )
        .with_entity(
            EntityDef::new("Agent", "id")
                .with_scalar("id", ScalarType::Int64)
                .with_scalar("name", ScalarType::String),
        );
    let builder = QueryBuilder::new(&catalog);

    let err = builder
        .build_query(
            &QueryModel::new("Book")
                .join("authorAgent")
                .filter(Criterion::eq("author.name", "Le Guin")),
        )
        .unwrap_err();
    assert_eq!(err.message, "Property is not joined at path: author");

    let compiled = builder
        .build_query(
            &QueryModel::new("Book")
                .join("authorAgent")
                .filter(Criterion::eq("authorAgent.name", "Kidd")),
        )
        .unwrap();
    assert!(compiled.query.ends_with("{$match:{'authorAgent.name':{$eq:'Kidd'}}}]"));
}

#[test]
fn test_embedded_without_comparable_leaves_is_rejected() {
    let catalog = Catalog::new()
        .with_entity(
            EntityDef::new("Book", "id")
                .with_scalar("id", ScalarType::Int64)
                .with_association("notes", AssociationDef::embedded("Notes")),
        )
        .with_entity(
            EntityDef::embeddable("Notes")
                .with_association("chapters", AssociationDef::one_to_many("Chapter")),
        )
        .with_entity(
            EntityDef::new("Chapter", "id").with_scalar("id", ScalarType::Int64),
        );

    let err = compile(&catalog, "Book", Criterion::eq("notes", BindingParameter::argument(0)))
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
    assert_eq!(
        err.message,
        "Cannot use [Equals] criterion on property without comparable values: notes"
    );
}

// ============================================================================
// Bindings
// ============================================================================

#[test]
fn test_bindings_split_parts() {
    let ctx = TestContext::new();
    let compiled = compile(
        &ctx.catalog,
        "Book",
        Criterion::and(vec![
            Criterion::eq("title", BindingParameter::named("title")),
            Criterion::gt("pages", BindingParameter::argument(1)),
        ]),
    )
    .unwrap();

    assert_eq!(
        compiled.query,
        "{$and:[{book_title:{$eq:{$qpidx:0}}},{pages:{$gt:{$qpidx:1}}}]}"
    );
    assert_eq!(
        compiled.parts,
        vec![
            "{$and:[{book_title:{$eq:".to_string(),
            "}},{pages:{$gt:".to_string(),
            "}}]}".to_string(),
        ]
    );
    assert_eq!(compiled.parts.len(), compiled.bindings.len() + 1);

    let keys: Vec<&str> = compiled.bindings.iter().map(|b| b.key.as_str()).collect();
    assert_eq!(keys, vec!["0", "1"]);
    assert_eq!(compiled.bindings[0].source.name.as_deref(), Some("title"));
    assert_eq!(compiled.bindings[1].source.argument_index, Some(1));
    assert!(!compiled.bindings[0].expandable);

    let materialized = compiled
        .materialize(&[Value::from("Dune"), Value::Int64(300)])
        .unwrap();
    assert_eq!(
        materialized.query,
        "{$and:[{book_title:{$eq:'Dune'}},{pages:{$gt:300}}]}"
    );
}

#[test]
fn test_literal_only_query_has_single_part() {
    let ctx = TestContext::new();
    let compiled = compile(&ctx.catalog, "Book", Criterion::eq("pages", 1i64)).unwrap();
    assert!(compiled.bindings.is_empty());
    assert_eq!(compiled.parts, vec![compiled.query.clone()]);
}

// ============================================================================
// Pipelines
// ============================================================================

#[test]
fn test_empty_model_is_empty_document() {
    let ctx = TestContext::new();
    let compiled = ctx.builder().build_query(&QueryModel::new("Book")).unwrap();
    assert_eq!(compiled.query, "{}");
    assert_eq!(compiled.pagination, None);
}

#[test]
fn test_full_pipeline() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Book")
        .filter(Criterion::gt("pages", 100i64))
        .project(Projection::Property("title".into()))
        .project(Projection::Id)
        .order_by(OrderSpec::desc("pages"))
        .order_by(OrderSpec::asc("title"))
        .paginate(Pagination::new(10, 20));

    let compiled = ctx.builder().build_query(&model).unwrap();
    assert_eq!(
        compiled.query,
        "[{$match:{pages:{$gt:100}}},{$project:{book_title:1,'_id':1}},\
         {$sort:{pages:-1,book_title:1}},{$skip:20},{$limit:10}]"
    );
    assert_eq!(compiled.pagination, Some(Pagination::new(10, 20)));
}

#[test]
fn test_count_and_aggregates() {
    let ctx = TestContext::new();
    let compiled = ctx
        .builder()
        .build_query(
            &QueryModel::new("Book")
                .filter(Criterion::eq("published", true))
                .project(Projection::Count),
        )
        .unwrap();
    assert_eq!(
        compiled.query,
        "[{$match:{published:{$eq:true}}},{$count:'result'}]"
    );

    let compiled = ctx
        .builder()
        .build_query(&QueryModel::new("Book").project(Projection::Sum("pages".into())))
        .unwrap();
    assert_eq!(compiled.query, "[{$project:{pages:{$sum:'$pages'}}}]");

    let compiled = ctx
        .builder()
        .build_query(&QueryModel::new("Book").project(Projection::Max("rating".into())))
        .unwrap();
    assert_eq!(compiled.query, "[{$project:{rating:{$max:'$rating'}}}]");
}

#[test]
fn test_limit_without_offset() {
    let ctx = TestContext::new();
    let compiled = ctx
        .builder()
        .build_query(&QueryModel::new("Book").paginate(Pagination::limit(5)))
        .unwrap();
    assert_eq!(compiled.query, "[{$limit:5}]");
}

#[test]
fn test_unknown_sort_and_projection() {
    let ctx = TestContext::new();
    let err = ctx
        .builder()
        .build_query(&QueryModel::new("Book").order_by(OrderSpec::asc("words")))
        .unwrap_err();
    assert_eq!(err.message, "Cannot order on non-existent property path: words");

    let err = ctx
        .builder()
        .build_query(&QueryModel::new("Book").project(Projection::Property("words".into())))
        .unwrap_err();
    assert_eq!(err.message, "Cannot project on non-existent property: words");
}

#[test]
fn test_owning_side_join() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Book")
        .join("author")
        .filter(Criterion::eq("author.name", "Le Guin"));

    let compiled = ctx.builder().build_query(&model).unwrap();
    assert_eq!(
        compiled.query,
        "[{$lookup:{from:'Author',localField:'author._id',foreignField:'_id',pipeline:[],as:'author'}},\
         {$unwind:{path:'$author',preserveNullAndEmptyArrays:true}},\
         {$match:{'author.name':{$eq:'Le Guin'}}}]"
    );
}

#[test]
fn test_nested_join() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Book")
        .join("author.publisher")
        .join("author")
        .filter(Criterion::eq("author.publisher.name", "Ace"));

    let compiled = ctx.builder().build_query(&model).unwrap();
    assert_eq!(
        compiled.query,
        "[{$lookup:{from:'Author',localField:'author._id',foreignField:'_id',pipeline:[\
         {$lookup:{from:'Publisher',localField:'publisher._id',foreignField:'_id',pipeline:[],as:'publisher'}},\
         {$unwind:{path:'$publisher',preserveNullAndEmptyArrays:true}}],as:'author'}},\
         {$unwind:{path:'$author',preserveNullAndEmptyArrays:true}},\
         {$match:{'author.publisher.name':{$eq:'Ace'}}}]"
    );
}

#[test]
fn test_mapped_by_join() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Author")
        .join("books")
        .filter(Criterion::eq("books.title", "Dune"));

    let compiled = ctx.builder().build_query(&model).unwrap();
    assert_eq!(
        compiled.query,
        "[{$lookup:{from:'Book',localField:'_id',foreignField:'author._id',pipeline:[],as:'books'}},\
         {$match:{'books.book_title':{$eq:'Dune'}}}]"
    );
}

#[test]
fn test_join_table_join() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Book")
        .join("tags")
        .filter(Criterion::eq("tags.label", "classic"));

    let compiled = ctx.builder().build_query(&model).unwrap();
    assert_eq!(
        compiled.query,
        "[{$lookup:{from:'Book_tags',localField:'_id',foreignField:'Book',pipeline:[\
         {$lookup:{from:'Tag',localField:'Tag',foreignField:'_id',pipeline:[],as:'Tag'}},\
         {$unwind:{path:'$Tag',preserveNullAndEmptyArrays:true}},\
         {$replaceRoot:{newRoot:'$Tag'}}],as:'tags'}},\
         {$match:{'tags.label':{$eq:'classic'}}}]"
    );
}

#[test]
fn test_composite_identity_join() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Review")
        .join("printing")
        .filter(Criterion::gt("printing.copies", 1000i64));

    let compiled = ctx.builder().build_query(&model).unwrap();
    assert_eq!(
        compiled.query,
        "[{$lookup:{from:'Printing',let:{v1:'$printing._id.isbn',v2:'$printing._id.run'},pipeline:[\
         {$match:{$expr:{$and:[{$eq:['$$v1','$_id.isbn']},{$eq:['$$v2','$_id.run']}]}}}],as:'printing'}},\
         {$unwind:{path:'$printing',preserveNullAndEmptyArrays:true}},\
         {$match:{'printing.copies':{$gt:1000}}}]"
    );
}

#[test]
fn test_unknown_join_path() {
    let ctx = TestContext::new();
    let err = ctx
        .builder()
        .build_query(&QueryModel::new("Book").join("editor"))
        .unwrap_err();
    assert_eq!(err.message, "Cannot join on non-existent property path: editor");
}

// ============================================================================
// Update and delete
// ============================================================================

#[test]
fn test_update() {
    let ctx = TestContext::new();
    let model = QueryModel::new("Book").filter(Criterion::eq("id", BindingParameter::argument(0)));
    let compiled = ctx
        .builder()
        .build_update(
            &model,
            &[
                Assignment::new("title", BindingParameter::named("title")),
                Assignment::new("pages", 10i64),
            ],
        )
        .unwrap();

    assert_eq!(compiled.query, "{'_id':{$eq:{$qpidx:0}}}");
    assert_eq!(
        compiled.update.as_deref(),
        Some("{$set:{book_title:{$qpidx:1},pages:10}}")
    );
    assert_eq!(
        compiled.update_parts,
        vec!["{$set:{book_title:".to_string(), ",pages:10}}".to_string()]
    );
    assert_eq!(compiled.bindings.len(), 2);
    assert_eq!(compiled.query_binding_count(), 1);

    let materialized = compiled
        .materialize(&[Value::Int64(7), Value::from("New")])
        .unwrap();
    assert_eq!(materialized.query, "{'_id':{$eq:7}}");
    assert_eq!(
        materialized.update.as_deref(),
        Some("{$set:{book_title:'New',pages:10}}")
    );
}

#[test]
fn test_update_requires_assignments() {
    let ctx = TestContext::new();
    let err = ctx
        .builder()
        .build_update(&QueryModel::new("Book"), &[])
        .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
}

#[test]
fn test_update_unknown_property() {
    let ctx = TestContext::new();
    let err = ctx
        .builder()
        .build_update(&QueryModel::new("Book"), &[Assignment::new("words", 1i64)])
        .unwrap_err();
    assert_eq!(
        err.message,
        "Cannot use [Update] criterion on non-existent property path: words"
    );
}

#[test]
fn test_delete() {
    let ctx = TestContext::new();
    let compiled = ctx
        .builder()
        .build_delete(&QueryModel::new("Book").filter(Criterion::lt("pages", 10i64)))
        .unwrap();
    assert_eq!(compiled.query, "{pages:{$lt:10}}");
    assert_eq!(compiled.update, None);

    let compiled = ctx.builder().build_delete(&QueryModel::new("Book")).unwrap();
    assert_eq!(compiled.query, "{}");
}

#[test]
fn test_update_and_delete_reject_joins() {
    let ctx = TestContext::new();
    let joined = QueryModel::new("Book").join("author");
    let err = ctx.builder().build_delete(&joined).unwrap_err();
    assert_eq!(err.message, "Joins cannot be used in a DELETE or UPDATE operation");

    let err = ctx
        .builder()
        .build_update(&joined, &[Assignment::new("pages", 1i64)])
        .unwrap_err();
    assert_eq!(err.message, "Joins cannot be used in a DELETE or UPDATE operation");

    let reaching = QueryModel::new("Book").filter(Criterion::eq("author.name", "X"));
    let err = ctx.builder().build_delete(&reaching).unwrap_err();
    assert_eq!(err.message, "Joins cannot be used in a DELETE or UPDATE operation");

    // Identities of one-valued associations live on the document itself.
    let owner = QueryModel::new("Book").filter(Criterion::eq("author.id", 1i64));
    assert_eq!(
        ctx.builder().build_delete(&owner).unwrap().query,
        "{'author._id':{$eq:1}}"
    );
}
