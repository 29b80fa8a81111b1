//! Add the `lessons` relation (chapters → lecture, up to 999 entries).

use crate::app::App;
use crate::error::Result;
use crate::migrations::update_collection;

const COLLECTION_ID: &str = "pbc_2272205672";
const FIELD_ID: &str = "relation1061296345";

pub fn up(app: &App) -> Result<()> {
    update_collection(app, COLLECTION_ID, |collection| {
        collection.fields.add_marshaled_json_at(
            3,
            r#"{
                "cascadeDelete": false,
                "collectionId": "pbc_1345586850",
                "hidden": false,
                "id": "relation1061296345",
                "maxSelect": 999,
                "minSelect": 0,
                "name": "lessons",
                "presentable": false,
                "required": false,
                "system": false,
                "type": "relation"
            }"#,
        )
    })
}

pub fn down(app: &App) -> Result<()> {
    update_collection(app, COLLECTION_ID, |collection| {
        collection.fields.remove_by_id(FIELD_ID);
        Ok(())
    })
}
