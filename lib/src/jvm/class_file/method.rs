use crate::jvm::class_file::{Attribute, AttributeLike};
use crate::jvm::code::{
    AuxiliaryTables, CodeUnit, ExceptionHandler, LineNumberTable, LocalVariableTable, StackMap,
};
use crate::jvm::constants::ConstantTable;
use crate::jvm::{read_bytes, Deserialize, Error, FormatError, MethodAccessFlags};
use byteorder::ReadBytesExt;

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,

    /// Decoded `Code` attribute (absent on `abstract` and `native` methods)
    pub code: Option<Code>,

    /// Every other attribute
    pub attributes: Vec<Attribute>,
}

impl Method {
    /// Read a method, decoding its `Code` attribute
    ///
    /// `constants` must already be resolved. `class_name` is only used to name the code.
    pub fn read<R: ReadBytesExt>(
        reader: &mut R,
        constants: &ConstantTable,
        class_name: &str,
    ) -> Result<Method, Error> {
        let access_flags = MethodAccessFlags::deserialize(reader)?;
        let name_index = u16::deserialize(reader)?;
        let descriptor_index = u16::deserialize(reader)?;
        let qualified_name = format!(
            "{}.{}{}",
            class_name,
            constants.utf8(name_index)?,
            constants.utf8(descriptor_index)?
        );

        let mut code = None;
        let mut attributes = vec![];
        for attribute in Vec::<Attribute>::deserialize(reader)? {
            if constants.utf8(attribute.name_index)? == Code::NAME {
                code = Some(Code::read(&attribute, constants, qualified_name.clone())?);
            } else {
                attributes.push(attribute);
            }
        }

        Ok(Method {
            access_flags,
            name_index,
            descriptor_index,
            code,
            attributes,
        })
    }
}

/// Body of a method
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: CodeUnit,
    pub tables: AuxiliaryTables,

    /// Attributes of the code other than the offset-keyed tables
    pub attributes: Vec<Attribute>,
}

impl Code {
    pub const NAME: &'static str = "Code";

    /// Decode the payload of a `Code` attribute
    pub fn read(
        attribute: &Attribute,
        constants: &ConstantTable,
        method: String,
    ) -> Result<Code, Error> {
        let mut info: &[u8] = &attribute.info;
        let max_stack = u16::deserialize(&mut info)?;
        let max_locals = u16::deserialize(&mut info)?;
        let code_length = u32::deserialize(&mut info)? as usize;
        if code_length > u16::MAX as usize {
            return Err(Error::Format(FormatError::CodeTooLong {
                method,
                length: code_length,
            }));
        }
        let code = CodeUnit::new(method, read_bytes(&mut info, code_length)?);

        let mut tables = AuxiliaryTables {
            exception_table: Vec::<ExceptionHandler>::deserialize(&mut info)?,
            ..AuxiliaryTables::default()
        };
        let mut attributes = vec![];
        for nested in Vec::<Attribute>::deserialize(&mut info)? {
            let name = constants.utf8(nested.name_index)?;
            if name == LineNumberTable::NAME {
                tables.line_numbers = Some(nested.parse()?);
            } else if name == LocalVariableTable::NAME {
                tables.local_variables = Some(nested.parse()?);
            } else if name == StackMap::NAME {
                tables.stack_map = Some(nested.parse()?);
            } else {
                attributes.push(nested);
            }
        }
        if !info.is_empty() {
            return Err(Error::Format(FormatError::AttributeLength {
                name: String::from(Code::NAME),
                declared: attribute.info.len(),
                consumed: attribute.info.len() - info.len(),
            }));
        }

        log::trace!(
            "Read code of {} ({} bytes, {} handlers)",
            code.method(),
            code.len(),
            tables.exception_table.len()
        );
        Ok(Code {
            max_stack,
            max_locals,
            code,
            tables,
            attributes,
        })
    }
}
