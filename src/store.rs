//! In-memory record store for users, categories, transactions and groups.
//!
//! `SharedStore` is cloned into every handler; take the lock, do the lookup or mutation,
//! and drop the guard before any `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    /// Refresh token handed out at the last login; cleared on logout.
    pub refresh_token: Option<String>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.username, &self.email, &self.role).with_id(self.id.to_string())
    }

    pub fn view(&self) -> UserView {
        UserView { username: self.username.clone(), email: self.email.clone(), role: self.role.clone() }
    }
}

/// Public projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub username: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
}

/// Result of creating a group: the group plus the requested emails that were left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreation {
    pub group: Group,
    pub already_in_group: Vec<String>,
    pub members_not_found: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Store {
    users: BTreeMap<String, User>,
    categories: BTreeMap<String, Category>,
    transactions: Vec<Transaction>,
    groups: BTreeMap<String, Group>,
}

impl Store {
    pub fn register_user(&mut self, username: &str, email: &str, password_hash: String, role: &str) -> AppResult<User> {
        if self.users.contains_key(username) {
            return Err(AppError::conflict("user_exists", "Username already taken"));
        }
        if self.user_by_email(email).is_some() {
            return Err(AppError::conflict("user_exists", "Email already registered"));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: role.to_string(),
            refresh_token: None,
        };
        self.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    pub fn user(&self, username: &str) -> Option<&User> { self.users.get(username) }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    pub fn user_by_refresh_token(&self, token: &str) -> Option<&User> {
        self.users.values().find(|u| u.refresh_token.as_deref() == Some(token))
    }

    pub fn set_refresh_token(&mut self, username: &str, token: Option<String>) -> AppResult<()> {
        let user = self.users.get_mut(username)
            .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
        user.refresh_token = token;
        Ok(())
    }

    pub fn users(&self) -> Vec<UserView> { self.users.values().map(User::view).collect() }

    pub fn create_category(&mut self, kind: &str, color: &str) -> AppResult<Category> {
        if self.categories.contains_key(kind) {
            return Err(AppError::conflict("category_exists", "Category already exists"));
        }
        let category = Category { kind: kind.to_string(), color: color.to_string() };
        self.categories.insert(category.kind.clone(), category.clone());
        Ok(category)
    }

    pub fn category(&self, kind: &str) -> Option<&Category> { self.categories.get(kind) }

    pub fn categories(&self) -> Vec<Category> { self.categories.values().cloned().collect() }

    pub fn create_transaction(&mut self, username: &str, amount: f64, kind: &str) -> AppResult<Transaction> {
        if !self.users.contains_key(username) {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        if !self.categories.contains_key(kind) {
            return Err(AppError::not_found("category_not_found", "Category not found"));
        }
        let tx = Transaction { id: Uuid::new_v4(), username: username.to_string(), amount, kind: kind.to_string(), date: Utc::now() };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    pub fn transactions(&self) -> Vec<Transaction> { self.transactions.clone() }

    pub fn transactions_by_users(&self, usernames: &[String]) -> Vec<Transaction> {
        self.transactions.iter().filter(|t| usernames.contains(&t.username)).cloned().collect()
    }

    pub fn group(&self, name: &str) -> Option<&Group> { self.groups.get(name) }

    pub fn groups(&self) -> Vec<Group> { self.groups.values().cloned().collect() }

    pub fn group_of(&self, email: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.members.iter().any(|m| m == email))
    }

    /// Create a group holding the creator plus every requested email that belongs to a
    /// registered user not already in some group.
    pub fn create_group(&mut self, name: &str, creator_email: &str, requested: &[String]) -> AppResult<GroupCreation> {
        if self.groups.contains_key(name) {
            return Err(AppError::conflict("group_exists", "Group already exists"));
        }
        if self.group_of(creator_email).is_some() {
            return Err(AppError::user("already_in_group", "You are already in a group"));
        }

        let mut members = vec![creator_email.to_string()];
        let mut already_in_group = Vec::new();
        let mut members_not_found = Vec::new();
        for email in requested.iter().filter(|e| e.as_str() != creator_email) {
            if members.contains(email) {
                continue;
            }
            if self.user_by_email(email).is_none() {
                members_not_found.push(email.clone());
            } else if self.group_of(email).is_some() {
                already_in_group.push(email.clone());
            } else {
                members.push(email.clone());
            }
        }
        if members.len() == 1 && !requested.is_empty() && requested.iter().any(|e| e != creator_email) {
            return Err(AppError::user("no_members", "All the member emails either do not exist or are already in a group"));
        }

        let group = Group { name: name.to_string(), members };
        self.groups.insert(group.name.clone(), group.clone());
        Ok(GroupCreation { group, already_in_group, members_not_found })
    }

    /// Usernames of the group's members, in member order.
    pub fn member_usernames(&self, group: &Group) -> Vec<String> {
        group.members.iter().filter_map(|e| self.user_by_email(e)).map(|u| u.username.clone()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedStore(pub Arc<RwLock<Store>>);

impl SharedStore {
    pub fn new() -> Self { Self::default() }
}
