//! Reference queries against the `books` collection.
//!
//! Each constructor parses the query-language form of one query, so the values
//! returned here are exactly what a caller would get from parsing the same
//! documents at runtime.
//!
//! ```ignore
//! use docquery::{catalog, prelude::*};
//!
//! let books = store.collection("books");
//! let fiction = books.find(catalog::fiction_books()?).await?;
//! let by_genre = books.aggregate(catalog::average_price_by_genre()?).await?;
//! ```

use bson::{Document, doc};

use docquery_core::{
    error::DocumentStoreResult,
    index::IndexModel,
    pipeline::Pipeline,
    projection::Projection,
    query::{Expr, Query, QueryBuilder, Sort},
    update::Update,
};

fn find(filter: Document) -> DocumentStoreResult<QueryBuilder> {
    Ok(Query::builder().filter(Expr::parse(&filter)?))
}

/// Books in the "Fiction" genre.
pub fn fiction_books() -> DocumentStoreResult<Query> {
    Ok(find(doc! { "genre": "Fiction" })?.build())
}

/// Books published after the year 2000.
pub fn published_after_2000() -> DocumentStoreResult<Query> {
    Ok(find(doc! { "published_year": { "$gt": 2000 } })?.build())
}

/// Books by George Orwell.
pub fn by_george_orwell() -> DocumentStoreResult<Query> {
    Ok(find(doc! { "author": "George Orwell" })?.build())
}

/// Sets the price of "The Great Gatsby" to 13.99.
pub fn gatsby_price_update() -> DocumentStoreResult<(Expr, Update)> {
    Ok((
        Expr::parse(&doc! { "title": "The Great Gatsby" })?,
        Update::parse(&doc! { "$set": { "price": 13.99 } })?,
    ))
}

/// Filter selecting "Moby Dick" for deletion.
pub fn moby_dick_delete() -> DocumentStoreResult<Expr> {
    Expr::parse(&doc! { "title": "Moby Dick" })
}

/// Books that are in stock and published after 2010.
pub fn in_stock_after_2010() -> DocumentStoreResult<Query> {
    Ok(find(doc! { "in_stock": true, "published_year": { "$gt": 2010 } })?.build())
}

/// Every book reduced to title, author and price.
pub fn title_author_price() -> DocumentStoreResult<Query> {
    Ok(find(doc! {})?
        .projection(Projection::parse(&doc! { "_id": 0, "title": 1, "author": 1, "price": 1 })?)
        .build())
}

/// All books, cheapest first.
pub fn by_price_ascending() -> DocumentStoreResult<Query> {
    Ok(Query::builder()
        .sort_by(Sort::parse(&doc! { "price": 1 })?)
        .build())
}

/// All books, most expensive first.
pub fn by_price_descending() -> DocumentStoreResult<Query> {
    Ok(Query::builder()
        .sort_by(Sort::parse(&doc! { "price": -1 })?)
        .build())
}

/// The first five books in store order.
pub fn first_page() -> Query {
    Query::builder().limit(5).build()
}

/// The next five books in store order.
pub fn second_page() -> Query {
    Query::builder().skip(5).limit(5).build()
}

/// Average price per genre.
pub fn average_price_by_genre() -> DocumentStoreResult<Pipeline> {
    Pipeline::parse(&[
        doc! { "$group": { "_id": "$genre", "averagePrice": { "$avg": "$price" } } },
    ])
}

/// The author with the most books.
pub fn top_author() -> DocumentStoreResult<Pipeline> {
    Pipeline::parse(&[
        doc! { "$group": { "_id": "$author", "bookCount": { "$sum": 1 } } },
        doc! { "$sort": { "bookCount": -1 } },
        doc! { "$limit": 1 },
    ])
}

/// Number of books per publication decade, labelled like `"1920s"`.
///
/// The label is the first three characters of the year followed by `"0s"`, so
/// years outside 1000..=9999 produce odd labels such as `"8120s"` for 812.
pub fn books_per_decade() -> DocumentStoreResult<Pipeline> {
    Pipeline::parse(&[
        doc! { "$project": {
            "decade": { "$concat": [ { "$substr": [ "$published_year", 0, 3 ] }, "0s" ] },
        } },
        doc! { "$group": { "_id": "$decade", "count": { "$sum": 1 } } },
        doc! { "$sort": { "_id": 1 } },
    ])
}

/// Index on `title`.
pub fn title_index() -> DocumentStoreResult<IndexModel> {
    IndexModel::parse(&doc! { "title": 1 })
}

/// Compound index on `author` then `published_year`.
pub fn author_year_index() -> DocumentStoreResult<IndexModel> {
    IndexModel::parse(&doc! { "author": 1, "published_year": 1 })
}

/// Lookup by title, used to compare plans before and after [`title_index`].
pub fn hobbit_by_title() -> DocumentStoreResult<Query> {
    Ok(find(doc! { "title": "The Hobbit" })?.build())
}
