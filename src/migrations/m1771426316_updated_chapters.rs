//! Mark `index` and `title` of `chapters` as presentable.

use crate::app::App;
use crate::error::Result;
use crate::migrations::update_collection;
use crate::model::Collection;

const COLLECTION_ID: &str = "pbc_2272205672";

fn set_presentable(collection: &mut Collection, presentable: bool) -> Result<()> {
    collection.fields.add_marshaled_json_at(
        1,
        &format!(
            r#"{{
                "hidden": false,
                "id": "number2155046657",
                "max": null,
                "min": null,
                "name": "index",
                "onlyInt": false,
                "presentable": {presentable},
                "required": false,
                "system": false,
                "type": "number"
            }}"#
        ),
    )?;

    collection.fields.add_marshaled_json_at(
        2,
        &format!(
            r#"{{
                "autogeneratePattern": "",
                "hidden": false,
                "id": "text724990059",
                "max": 0,
                "min": 0,
                "name": "title",
                "pattern": "",
                "presentable": {presentable},
                "primaryKey": false,
                "required": false,
                "system": false,
                "type": "text"
            }}"#
        ),
    )
}

pub fn up(app: &App) -> Result<()> {
    update_collection(app, COLLECTION_ID, |collection| {
        set_presentable(collection, true)
    })
}

pub fn down(app: &App) -> Result<()> {
    update_collection(app, COLLECTION_ID, |collection| {
        set_presentable(collection, false)
    })
}
