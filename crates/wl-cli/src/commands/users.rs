//! User administration.

use std::io::Write;

use anyhow::Result;

use wl_db::Database;

use crate::UsersAction;

use super::require_user;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &UsersAction) -> Result<()> {
    match action {
        UsersAction::Add { name, device } => {
            let user = db.create_user(name, device.as_ref())?;
            match &user.device {
                Some(device) => writeln!(writer, "Added {} with device {device}", user.name)?,
                None => writeln!(writer, "Added {}", user.name)?,
            }
        }
        UsersAction::List => {
            let users = db.list_users()?;
            if users.is_empty() {
                writeln!(writer, "No users.")?;
                return Ok(());
            }
            for user in users {
                let device = user
                    .device
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string);
                let state = if user.is_active { "active" } else { "inactive" };
                writeln!(writer, "{}  {device}  {state}", user.name)?;
            }
        }
        UsersAction::SetDevice { name, device } => {
            let user = require_user(db, name)?;
            db.set_user_device(user.id, Some(device))?;
            writeln!(writer, "Device {device} assigned to {}", user.name)?;
        }
        UsersAction::ClearDevice { name } => {
            let user = require_user(db, name)?;
            db.set_user_device(user.id, None)?;
            writeln!(writer, "Device cleared for {}", user.name)?;
        }
        UsersAction::Deactivate { name } => {
            let user = require_user(db, name)?;
            db.set_user_active(user.id, false)?;
            writeln!(writer, "Deactivated {}", user.name)?;
        }
        UsersAction::Activate { name } => {
            let user = require_user(db, name)?;
            db.set_user_active(user.id, true)?;
            writeln!(writer, "Activated {}", user.name)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use wl_core::DeviceId;

    #[test]
    fn add_and_list_users() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        run(
            &mut output,
            &mut db,
            &UsersAction::Add {
                name: "ana".to_string(),
                device: Some(DeviceId::new("AA-BB-CC-00-00-01").unwrap()),
            },
        )
        .unwrap();
        run(
            &mut output,
            &mut db,
            &UsersAction::Add {
                name: "ben".to_string(),
                device: None,
            },
        )
        .unwrap();
        run(
            &mut output,
            &mut db,
            &UsersAction::Deactivate {
                name: "ben".to_string(),
            },
        )
        .unwrap();
        run(&mut output, &mut db, &UsersAction::List).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Added ana with device aa:bb:cc:00:00:01
        Added ben
        Deactivated ben
        ana  aa:bb:cc:00:00:01  active
        ben  -  inactive
        ");
    }

    #[test]
    fn reassigning_a_taken_device_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let device = DeviceId::new("aa:bb:cc:00:00:01").unwrap();
        db.create_user("ana", Some(&device)).unwrap();
        db.create_user("ben", None).unwrap();

        let mut output = Vec::new();
        let err = run(
            &mut output,
            &mut db,
            &UsersAction::SetDevice {
                name: "ben".to_string(),
                device,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("already assigned"));
    }
}
