//! Replace the rich-text `question` of `mc_questions` with the plain text
//! field formerly named `qu`.

use crate::app::App;
use crate::error::Result;
use crate::migrations::update_collection;

const COLLECTION_ID: &str = "pbc_2001502728";

pub fn up(app: &App) -> Result<()> {
    update_collection(app, COLLECTION_ID, |collection| {
        collection.fields.remove_by_id("editor3069659470");

        collection.fields.add_marshaled_json_at(
            1,
            r#"{
                "autogeneratePattern": "",
                "hidden": false,
                "id": "text1469243387",
                "max": 0,
                "min": 0,
                "name": "question",
                "pattern": "",
                "presentable": false,
                "primaryKey": false,
                "required": false,
                "system": false,
                "type": "text"
            }"#,
        )
    })
}

pub fn down(app: &App) -> Result<()> {
    update_collection(app, COLLECTION_ID, |collection| {
        collection.fields.add_marshaled_json_at(
            1,
            r#"{
                "convertURLs": false,
                "hidden": false,
                "id": "editor3069659470",
                "maxSize": 0,
                "name": "question",
                "presentable": false,
                "required": false,
                "system": false,
                "type": "editor"
            }"#,
        )?;

        collection.fields.add_marshaled_json_at(
            4,
            r#"{
                "autogeneratePattern": "",
                "hidden": false,
                "id": "text1469243387",
                "max": 0,
                "min": 0,
                "name": "qu",
                "pattern": "",
                "presentable": false,
                "primaryKey": false,
                "required": false,
                "system": false,
                "type": "text"
            }"#,
        )
    })
}
