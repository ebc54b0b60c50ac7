use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Banner {
    pub title: String,
    pub src: String,
    pub text: String,
}
